//! Lookup orchestration: cache, then registry, then offline fallback
//!
//! [`LookupService`] is the one entry point the surrounding application
//! consumes. Every remote failure class (auth, network, parse, config) is
//! equally unrecoverable mid-session, so they all degrade to the offline
//! catalog; only when the catalog has nothing to offer does the original
//! remote error surface, so the caller can say *why* there are no results.

pub mod session;

use std::sync::Arc;

use crate::cache::ResultCache;
use crate::catalog::OfflineIndex;
use crate::client::{RegistryApi, SearchQuery, SearchResult};
use crate::error::Result;

pub use session::SearchSession;

/// Where a lookup outcome came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Served from the session cache
    Cache,
    /// Fresh from the live registry
    Registry,
    /// Served from the offline catalog after a remote failure
    OfflineFallback,
}

/// The outcome of one lookup
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    /// Matching results, shared and immutable
    pub results: Arc<Vec<SearchResult>>,
    /// Provenance of the results
    pub source: ResultSource,
}

impl LookupOutcome {
    fn new(results: Arc<Vec<SearchResult>>, source: ResultSource) -> Self {
        Self { results, source }
    }

    fn empty() -> Self {
        Self::new(Arc::new(Vec::new()), ResultSource::Registry)
    }

    /// Whether these results came from the offline fallback; the UI marks
    /// degraded results visually.
    pub fn is_degraded(&self) -> bool {
        self.source == ResultSource::OfflineFallback
    }
}

/// Facade over the registry client, session cache, and offline catalog
pub struct LookupService {
    remote: Arc<dyn RegistryApi>,
    cache: ResultCache,
    offline: OfflineIndex,
}

impl LookupService {
    pub fn new(remote: Arc<dyn RegistryApi>, offline: OfflineIndex) -> Self {
        Self {
            remote,
            cache: ResultCache::new(),
            offline,
        }
    }

    /// The session result cache (cleared by the application on session
    /// boundaries)
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Look up diagnostic codes for a query.
    ///
    /// Flow: cache hit → done; miss → registry, populating the cache on
    /// success; any remote failure → offline catalog, flagged degraded; an
    /// empty offline fallback surfaces the original remote error.
    pub async fn search(&self, query: SearchQuery) -> Result<LookupOutcome> {
        if !query.is_searchable() {
            return Ok(LookupOutcome::empty());
        }

        if let Some(hit) = self.cache.get(&query) {
            return Ok(LookupOutcome::new(hit, ResultSource::Cache));
        }

        match self.remote.search(&query).await {
            Ok(results) => {
                let results = Arc::new(results);
                self.cache.put(query, results.clone());
                Ok(LookupOutcome::new(results, ResultSource::Registry))
            }
            Err(remote_err) => {
                log::warn!(
                    "registry search failed ({remote_err}), falling back to offline catalog"
                );
                match self.offline.search(&query.text, query.limit as usize) {
                    Ok(hits) if !hits.is_empty() => {
                        Ok(LookupOutcome::new(Arc::new(hits), ResultSource::OfflineFallback))
                    }
                    Ok(_) => Err(remote_err),
                    Err(offline_err) => {
                        log::warn!("offline fallback also failed: {offline_err}");
                        Err(remote_err)
                    }
                }
            }
        }
    }
}
