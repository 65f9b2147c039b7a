//! Configuration for the registry client
//!
//! Credentials live in a YAML file outside version control. Its absence is a
//! configuration error, kept distinct from network failures so the caller can
//! tell "not set up" apart from "registry unreachable".

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Default token endpoint of the classification registry
pub const DEFAULT_TOKEN_URL: &str = "https://icdaccessmanagement.who.int/connect/token";

/// Default search base URL (release + linearization path included)
pub const DEFAULT_API_BASE: &str = "https://id.who.int/icd/release/11/2024-01/mms";

/// OAuth2 scope requested with client-credentials grants
pub const DEFAULT_SCOPE: &str = "icdapi_access";

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_language() -> String {
    "es".to_string()
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    /// OAuth2 client id issued by the registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth2 client secret issued by the registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Token endpoint override (tests point this at a local server)
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Search API base URL override
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// OAuth2 scope
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Preferred language for titles (Accept-Language)
    #[serde(default = "default_language")]
    pub language: String,

    /// Path to the bundled seed dataset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_token_url(),
            api_base: default_api_base(),
            scope: default_scope(),
            language: default_language(),
            dataset: None,
        }
    }
}

impl RegistryConfig {
    /// Get the default config file path (`~/.icdlookup/config.yaml`)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".icdlookup").join("config.yaml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: RegistryConfig = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Return the configured credential pair, or a config error if incomplete
    pub fn credentials(&self) -> Result<(String, String)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok((id.clone(), secret.clone()))
            }
            _ => Err(ConfigError::MissingCredentials.into()),
        }
    }
}
