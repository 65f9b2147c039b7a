//! Mock registry client for testing
//!
//! Implements [`RegistryApi`] without network access so facade and session
//! behavior can be verified deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{RegistryApi, SearchQuery, SearchResult};
use crate::error::{ApiError, Result};

/// Scriptable mock registry.
///
/// Configure via builder methods, then assert on `search_calls()`.
#[derive(Default)]
pub struct MockRegistryClient {
    results: Mutex<Vec<SearchResult>>,
    error: Mutex<Option<ApiError>>,
    missing_credentials: bool,
    delay: Option<Duration>,
    search_calls: AtomicUsize,
}

impl MockRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned by every successful search
    pub fn with_results(self, results: Vec<SearchResult>) -> Self {
        *self.results.lock().unwrap() = results;
        self
    }

    /// Fail every search with a clone of this error
    pub fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().unwrap() = Some(error);
        self
    }

    /// Fail every search as an unconfigured installation
    pub fn with_missing_credentials(mut self) -> Self {
        self.missing_credentials = true;
        self
    }

    /// Delay each search, for supersede/cancellation tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of search calls that reached the mock
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryApi for MockRegistryClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if !query.is_searchable() {
            return Ok(Vec::new());
        }

        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.missing_credentials {
            return Err(crate::error::ConfigError::MissingCredentials.into());
        }

        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(err.into());
        }

        Ok(self.results.lock().unwrap().clone())
    }
}

/// A minimal valid result for tests
pub fn sample_result(id: &str, code: &str, title: &str) -> SearchResult {
    SearchResult {
        external_id: id.to_string(),
        code: Some(code.to_string()),
        title: title.to_string(),
        chapter: Some("06".to_string()),
        score: Some(0.5),
    }
}
