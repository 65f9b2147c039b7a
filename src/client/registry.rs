//! Live search client for the classification registry
//!
//! Issues rate-limited, authenticated GET requests against the registry's
//! flat search endpoint and normalizes its loosely-shaped JSON into
//! [`SearchResult`] values.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::Deserialize;

use super::{RegistryApi, SearchQuery, SearchResult, TokenManager};
use crate::config::RegistryConfig;
use crate::error::{ApiError, Result};

/// Outbound request budget against the registry
const RATE_LIMIT_PER_SECOND: u32 = 6;

/// API version marker required by the registry
const API_VERSION: &str = "v2";

/// Client for the registry's search endpoint
pub struct RegistryClient {
    http: HttpClient,
    api_base: String,
    tokens: Arc<TokenManager>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RegistryClient {
    /// Build a client (and its token manager) from the loaded configuration
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let tokens = Arc::new(TokenManager::from_config(http.clone(), config));
        Ok(Self::new(http, config.api_base.clone(), tokens))
    }

    pub fn new(http: HttpClient, api_base: String, tokens: Arc<TokenManager>) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_PER_SECOND).unwrap());
        Self {
            http,
            api_base,
            tokens,
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    /// The token manager backing this client
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    async fn send_search(&self, bearer: &str, query: &SearchQuery) -> Result<Response> {
        let url = format!("{}/search", self.api_base);
        let offset = query.offset.to_string();
        let limit = query.limit.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query.text.as_str()),
                ("flatResults", "true"),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ])
            .header("Authorization", format!("Bearer {bearer}"))
            .header("API-Version", API_VERSION)
            .header("Accept-Language", &query.language)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(ApiError::from)?;
        Ok(response)
    }

    async fn read_results(&self, response: Response) -> Result<Vec<SearchResult>> {
        let status = response.status();
        match status {
            StatusCode::OK => {
                let body: SearchResponse = response.json().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse search response: {e}"))
                })?;
                Ok(normalize_entities(body.destination_entities))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                Err(ApiError::RateLimit(Duration::from_secs(retry_after)).into())
            }
            s if s.is_server_error() => {
                let msg = response
                    .text()
                    .await
                    .unwrap_or_else(|_| format!("Server error: {s}"));
                Err(ApiError::ServerError(msg).into())
            }
            _ => Err(ApiError::InvalidResponse(format!("Unexpected status code: {status}")).into()),
        }
    }
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        if !query.is_searchable() {
            return Ok(Vec::new());
        }

        self.rate_limiter.until_ready().await;

        let bearer = self.tokens.bearer().await?;
        let response = self.send_search(&bearer, query).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return self.read_results(response).await;
        }

        // The registry rejected the credential mid-lifetime. Force a refresh
        // and retry the request exactly once; a second rejection surfaces as
        // an auth error rather than hammering a failing auth backend.
        log::debug!("search rejected as unauthorized, refreshing credential and retrying once");
        self.tokens.invalidate().await;
        let bearer = self.tokens.bearer().await?;
        let response = self.send_search(&bearer, query).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized.into());
        }
        self.read_results(response).await
    }
}

/// Flat search response envelope
#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default, rename = "destinationEntities")]
    destination_entities: Vec<RawEntity>,
}

/// A "maybe-valid" entity as the registry ships it; every field may be absent
#[derive(Deserialize)]
struct RawEntity {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "theCode")]
    the_code: Option<String>,
    chapter: Option<String>,
    score: Option<f64>,
}

/// Filter raw entities into normalized results, skipping (not aborting on)
/// records that lack an identifier or title.
fn normalize_entities(entities: Vec<RawEntity>) -> Vec<SearchResult> {
    entities
        .into_iter()
        .filter_map(|raw| {
            let (id, title) = match (raw.id, raw.title) {
                (Some(id), Some(title)) => (id, title),
                _ => {
                    log::debug!("skipping registry entity without id or title");
                    return None;
                }
            };
            Some(SearchResult {
                external_id: id,
                code: raw.the_code,
                title: strip_markup(&title),
                chapter: raw.chapter,
                score: raw.score,
            })
        })
        .collect()
}

/// Strip highlighting markup (`<em class='found'>…</em>` and friends) from a
/// registry title, leaving plain text.
fn strip_markup(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_tag = false;
    for ch in title.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
