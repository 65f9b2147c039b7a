//! Debounced, last-intent-wins search submissions
//!
//! An interactive input field fires a lookup per keystroke; this wrapper
//! debounces the input and discards superseded submissions via a generation
//! counter, so only the most recent query's result ever reaches the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{LookupOutcome, LookupService};
use crate::client::SearchQuery;
use crate::error::Result;

/// Input must be stable this long before a lookup is launched
pub const DEBOUNCE: Duration = Duration::from_millis(400);

/// Debounce/supersede wrapper around [`LookupService`] for one logical input
/// field
pub struct SearchSession {
    lookup: Arc<LookupService>,
    generation: AtomicU64,
    debounce: Duration,
}

impl SearchSession {
    pub fn new(lookup: Arc<LookupService>) -> Self {
        Self::with_debounce(lookup, DEBOUNCE)
    }

    /// Override the debounce window (tests use a short one)
    pub fn with_debounce(lookup: Arc<LookupService>, debounce: Duration) -> Self {
        Self {
            lookup,
            generation: AtomicU64::new(0),
            debounce,
        }
    }

    /// Submit the current input. Resolves to `None` when a newer submission
    /// supersedes this one, either during the debounce window or while the
    /// lookup is in flight; the stale result is discarded, not applied.
    pub async fn submit(&self, query: SearchQuery) -> Option<Result<LookupOutcome>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }

        let outcome = self.lookup.search(query).await;

        // A newer submission may have started while we were in flight; its
        // result wins even though ours resolved.
        if self.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        Some(outcome)
    }
}
