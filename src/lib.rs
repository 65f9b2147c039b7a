//! Diagnostic-code lookup for the ICD-11 classification registry
//!
//! Authenticates with OAuth2 client credentials, performs rate-aware
//! searches, caches results for the session, and degrades transparently to a
//! locally seeded offline catalog when the registry is unreachable.
//! [`lookup::LookupService`] is the entry point consumed by the surrounding
//! application; everything else supports it.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod lookup;
