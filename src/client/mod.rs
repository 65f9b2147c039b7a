//! Classification registry client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[cfg(test)]
pub mod mock;
pub mod registry;
pub mod token;

#[cfg(test)]
#[allow(unused_imports)]
pub use mock::MockRegistryClient;
pub use registry::RegistryClient;
pub use token::TokenManager;

/// Minimum trimmed query length before any network call is made.
///
/// Shorter input would fan out to overly broad registry queries, so it yields
/// an empty result instead of an error.
pub const MIN_QUERY_LEN: usize = 3;

/// Registry search trait
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Search the classification registry for entities matching the query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;
}

/// Normalized search parameters, used as the result-cache key.
///
/// Construct via [`SearchQuery::new`] so that equal logical queries compare
/// equal regardless of the original casing and surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    /// Trimmed, lowercased query text
    pub text: String,

    /// Result offset for paging
    pub offset: u32,

    /// Maximum number of results
    pub limit: u32,

    /// Language preference sent to the registry
    pub language: String,
}

impl SearchQuery {
    /// Normalize raw user input into a query key
    pub fn new(text: &str, offset: u32, limit: u32, language: &str) -> Self {
        Self {
            text: text.trim().to_lowercase(),
            offset,
            limit,
            language: language.to_string(),
        }
    }

    /// Whether the query is long enough to send to the registry
    pub fn is_searchable(&self) -> bool {
        self.text.chars().count() >= MIN_QUERY_LEN
    }
}

/// One normalized search hit from the registry (or the offline catalog)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Canonical, globally unique entity identifier (a URI for ICD-11)
    pub external_id: String,

    /// Classification code, when the entity has one assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Entity title with any highlighting markup stripped
    pub title: String,

    /// Chapter the entity belongs to, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,

    /// Relevance score; only the live registry ranks results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}
