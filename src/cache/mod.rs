//! Session-lifetime cache for registry search results
//!
//! Pure in-memory mapping with no TTL: the surrounding application clears it
//! on logical session boundaries, not on a timer. Values are shared as
//! `Arc<Vec<_>>` so concurrent readers never observe a partially written
//! result list.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::client::{SearchQuery, SearchResult};

/// In-memory result cache keyed by the normalized query
#[derive(Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<SearchQuery, Arc<Vec<SearchResult>>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up cached results for a normalized query
    pub fn get(&self, query: &SearchQuery) -> Option<Arc<Vec<SearchResult>>> {
        let entries = self.entries.read().ok()?;
        let hit = entries.get(query).cloned();
        if hit.is_some() {
            log::debug!("result cache hit: {:?}", query.text);
        }
        hit
    }

    /// Store results for a normalized query
    pub fn put(&self, query: SearchQuery, results: Arc<Vec<SearchResult>>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(query, results);
        }
    }

    /// Drop every entry (called on session boundaries)
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            let dropped = entries.len();
            entries.clear();
            log::debug!("result cache cleared ({dropped} entries)");
        }
    }

    /// Number of cached queries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
