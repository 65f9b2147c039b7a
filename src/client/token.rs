//! Bearer credential lifecycle for the classification registry
//!
//! Owns the one cached credential and refreshes it through the OAuth2
//! client-credentials grant. The credential slot sits behind a single
//! `tokio::sync::Mutex` that stays held across the refresh await, so
//! concurrent callers coalesce onto one in-flight token request instead of
//! issuing duplicates.

use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::RegistryConfig;
use crate::error::{ApiError, ConfigError, Result};

/// Seconds subtracted from the declared lifetime; a credential inside this
/// margin of expiry is treated as stale and never handed out.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// A bearer credential with its (margin-adjusted) expiry
#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Token endpoint response (RFC 6749 §4.4)
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Owns the cached registry credential and its refresh cycle.
///
/// Credentials may be absent (unconfigured installation); the error then
/// surfaces at request time as a `ConfigError`, distinct from network
/// failures, and the lookup facade degrades to the offline catalog.
pub struct TokenManager {
    http: HttpClient,
    token_url: String,
    credentials: Option<(String, String)>,
    scope: String,
    slot: Mutex<Option<Credential>>,
}

impl TokenManager {
    pub fn new(
        http: HttpClient,
        token_url: String,
        credentials: Option<(String, String)>,
        scope: String,
    ) -> Self {
        Self {
            http,
            token_url,
            credentials,
            scope,
            slot: Mutex::new(None),
        }
    }

    /// Build a manager from the loaded configuration
    pub fn from_config(http: HttpClient, config: &RegistryConfig) -> Self {
        let credentials = config.credentials().ok();
        Self::new(
            http,
            config.token_url.clone(),
            credentials,
            config.scope.clone(),
        )
    }

    /// Return a bearer token that is valid for at least the safety margin.
    ///
    /// Refreshes when no credential is cached or the cached one has gone
    /// stale. The slot mutex is held across the refresh, so N concurrent
    /// callers produce exactly one outbound token request; the others wake
    /// up, see the fresh credential, and return it.
    pub async fn bearer(&self) -> Result<String> {
        let mut slot = self.slot.lock().await;

        if let Some(cred) = slot.as_ref() {
            if cred.is_fresh(Utc::now()) {
                return Ok(cred.token.clone());
            }
        }

        let cred = self.request_token().await?;
        let token = cred.token.clone();
        *slot = Some(cred);
        Ok(token)
    }

    /// Drop the cached credential so the next `bearer()` refreshes.
    ///
    /// Called by the search client after the registry rejects a request as
    /// unauthorized.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        *slot = None;
        log::debug!("registry credential invalidated");
    }

    async fn request_token(&self) -> Result<Credential> {
        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredentials)?;

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body: TokenResponse = response.json().await.map_err(|e| {
                    ApiError::InvalidResponse(format!("Failed to parse token response: {e}"))
                })?;

                let lifetime = chrono::Duration::seconds(body.expires_in - EXPIRY_MARGIN_SECS);
                let cred = Credential {
                    token: body.access_token,
                    expires_at: Utc::now() + lifetime,
                };
                log::debug!(
                    "registry credential refreshed, usable until {}",
                    cred.expires_at
                );
                Ok(cred)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST => {
                Err(ApiError::Unauthorized.into())
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

    #[cfg(test)]
    pub(crate) async fn set_credential(&self, token: &str, expires_at: DateTime<Utc>) {
        let mut slot = self.slot.lock().await;
        *slot = Some(Credential {
            token: token.to_string(),
            expires_at,
        });
    }
}
