//! SQLite-backed storage for the offline catalog
//!
//! The catalog is written exactly once (bulk import at first launch) and read
//! for the rest of the installation's life, so the schema is a single flat
//! table with an index on the class kind.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{CatalogEntry, ClassKind};
use crate::error::CatalogError;

/// Schema version - increment to trigger nuke-and-rebuild (the seeder then
/// repopulates on the next run)
const SCHEMA_VERSION: i32 = 1;

type Result<T> = std::result::Result<T, CatalogError>;

/// A catalog row as fed in by the seeder (ids are assigned on insert)
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub code: String,
    pub title: String,
    pub uri: String,
    pub class_kind: ClassKind,
    pub chapter_code: String,
}

/// SQLite-backed offline catalog store
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Open or create the catalog at the default data location
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_db_path()?)
    }

    /// Default database path (`<data dir>/icdlookup/catalog.db`)
    pub fn default_db_path() -> Result<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| CatalogError::Io("Could not determine data directory".to_string()))?;
        Ok(base.join("icdlookup").join("catalog.db"))
    }

    /// Open the catalog at a specific database path (used by tests and the
    /// `--catalog` CLI override)
    pub fn open_at(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CatalogError::Io(format!("Failed to create catalog dir: {e}")))?;
        }

        let conn = Connection::open(db_path)?;

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Catalog schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            conn.execute_batch("DROP TABLE IF EXISTS catalog_entries;")?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS catalog_entries (
                id TEXT PRIMARY KEY NOT NULL,
                code TEXT NOT NULL,
                title TEXT NOT NULL,
                uri TEXT NOT NULL UNIQUE,
                class_kind TEXT NOT NULL,
                chapter_code TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_class_kind ON catalog_entries(class_kind);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self { conn })
    }

    /// Number of rows in the catalog
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM catalog_entries", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// Insert one batch of rows inside a single transaction (one commit).
    ///
    /// Duplicate URIs within the dataset are ignored rather than erroring;
    /// each distinct URI is inserted once. Returns the number of rows
    /// actually inserted.
    pub fn insert_batch(&mut self, rows: &[NewEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO catalog_entries
                 (id, code, title, uri, class_kind, chapter_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for row in rows {
                inserted += stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    row.code,
                    row.title,
                    row.uri,
                    row.class_kind.as_str(),
                    row.chapter_code,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Locale-aware substring search over assignable entries.
    ///
    /// `needle` must already be lowercased. Rows are streamed from SQLite
    /// ordered by code (stable across identical queries) and matched in Rust
    /// so accented titles compare correctly; SQLite's LOWER only folds ASCII.
    pub fn search_assignable(&self, needle: &str, limit: usize) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, code, title, uri, class_kind, chapter_code
             FROM catalog_entries
             WHERE class_kind IN ('category', 'window')
             ORDER BY code",
        )?;

        let rows = stmt.query_map([], row_to_entry)?;

        let mut hits = Vec::new();
        for row in rows {
            let entry = row?;
            if entry.title.to_lowercase().contains(needle) {
                hits.push(entry);
                if hits.len() >= limit {
                    break;
                }
            }
        }
        Ok(hits)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogEntry> {
    let id_text: String = row.get(0)?;
    let id = Uuid::parse_str(&id_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let kind_text: String = row.get(4)?;
    let class_kind = ClassKind::parse(&kind_text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown class kind: {kind_text}").into(),
        )
    })?;

    Ok(CatalogEntry {
        id,
        code: row.get(1)?,
        title: row.get(2)?,
        uri: row.get(3)?,
        class_kind,
        chapter_code: row.get(5)?,
    })
}
