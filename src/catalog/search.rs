//! Offline substring search over the seeded catalog
//!
//! Fallback path when the registry is unreachable. Matches are containment
//! only; no relevance ranking is computed offline.

use std::sync::{Arc, Mutex};

use super::{CatalogEntry, CatalogStore};
use crate::client::SearchResult;
use crate::error::CatalogError;

/// Search index over the offline catalog
#[derive(Clone)]
pub struct OfflineIndex {
    store: Arc<Mutex<CatalogStore>>,
}

impl OfflineIndex {
    pub fn new(store: Arc<Mutex<CatalogStore>>) -> Self {
        Self { store }
    }

    /// Substring search against assignable catalog entries.
    ///
    /// Ordering is stable for repeated identical queries (rows come back in
    /// code order) but carries no relevance meaning.
    pub fn search(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>, CatalogError> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self.store.lock().map_err(|_| CatalogError::Lock)?;
        let entries = guard.search_assignable(&needle, limit)?;
        Ok(entries.into_iter().map(to_result).collect())
    }
}

fn to_result(entry: CatalogEntry) -> SearchResult {
    SearchResult {
        external_id: entry.uri,
        code: Some(entry.code),
        title: entry.title,
        chapter: Some(entry.chapter_code),
        // Only the live registry ranks results
        score: None,
    }
}
