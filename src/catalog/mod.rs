//! Locally persisted classification catalog
//!
//! A read-only (after one bulk import) table of catalog entries backing
//! offline search when the registry is unreachable.

pub mod search;
pub mod seeder;
pub mod store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use search::OfflineIndex;
pub use seeder::{seed_if_needed, SeedOutcome, SEED_BATCH_SIZE};
pub use store::CatalogStore;

/// Structural role of a classification node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Chapter,
    Block,
    Category,
    Window,
}

impl ClassKind {
    /// Whether entries of this kind are assignable diagnoses.
    ///
    /// Chapters and blocks are structural groupings, not valid diagnoses, so
    /// offline search excludes them.
    pub fn is_assignable(self) -> bool {
        matches!(self, ClassKind::Category | ClassKind::Window)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassKind::Chapter => "chapter",
            ClassKind::Block => "block",
            ClassKind::Category => "category",
            ClassKind::Window => "window",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chapter" => Some(ClassKind::Chapter),
            "block" => Some(ClassKind::Block),
            "category" => Some(ClassKind::Category),
            "window" => Some(ClassKind::Window),
            _ => None,
        }
    }
}

/// One persisted catalog row.
///
/// Created only by the seeder; never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub uri: String,
    pub class_kind: ClassKind,
    pub chapter_code: String,
}
