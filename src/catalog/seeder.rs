//! One-time bulk import of the bundled classification dataset
//!
//! The dataset is a JSON array with tens of thousands of rows, so it is
//! streamed through a `DeserializeSeed` sink and committed in fixed-size
//! batches: peak memory stays at one batch, and a crash mid-import loses only
//! the uncommitted tail.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Mutex;

use serde::de::{self, DeserializeSeed, Deserializer, SeqAccess, Visitor};

use super::store::{CatalogStore, NewEntry};
use crate::error::{CatalogError, SeedError};

/// Rows per transaction during the bulk import
pub const SEED_BATCH_SIZE: usize = 1_000;

/// What a seeding run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedOutcome {
    /// Rows inserted into the catalog
    pub inserted: usize,
    /// Transactions committed
    pub batches: usize,
}

/// Populate the offline catalog from the bundled dataset, at most once per
/// installation.
///
/// Short-circuits with a zero outcome when the store already holds rows or
/// when the dataset file is absent (the application then simply runs without
/// offline search). Note the idempotency check is row-count based: a crash
/// mid-import leaves a committed prefix that later runs treat as fully
/// seeded.
pub fn seed_if_needed(
    store: &Mutex<CatalogStore>,
    dataset: &Path,
) -> Result<SeedOutcome, SeedError> {
    {
        let guard = store.lock().map_err(|_| CatalogError::Lock)?;
        if guard.count().map_err(SeedError::Store)? > 0 {
            log::debug!("offline catalog already seeded, skipping import");
            return Ok(SeedOutcome::default());
        }
    }

    if !dataset.exists() {
        log::info!(
            "seed dataset not found at {}, offline search will stay empty",
            dataset.display()
        );
        return Ok(SeedOutcome::default());
    }

    let file = File::open(dataset)?;
    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));

    let mut sink = BatchSink {
        store,
        batch: Vec::with_capacity(SEED_BATCH_SIZE),
        outcome: SeedOutcome::default(),
        store_failure: None,
    };

    let parse_result = (&mut sink).deserialize(&mut deserializer);

    // A store failure aborts the parse via a custom serde error; report it
    // as itself instead of the serde wrapper.
    if let Some(err) = sink.store_failure.take() {
        return Err(err);
    }
    parse_result.map_err(|e| SeedError::Decode(e.to_string()))?;

    log::info!(
        "seeded offline catalog: {} entries in {} batches",
        sink.outcome.inserted,
        sink.outcome.batches
    );
    Ok(sink.outcome)
}

/// Streaming sink: buffers rows and commits one transaction per full batch
struct BatchSink<'a> {
    store: &'a Mutex<CatalogStore>,
    batch: Vec<NewEntry>,
    outcome: SeedOutcome,
    store_failure: Option<SeedError>,
}

impl BatchSink<'_> {
    fn flush(&mut self) -> Result<(), SeedError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let mut guard = self.store.lock().map_err(|_| CatalogError::Lock)?;
        self.outcome.inserted += guard.insert_batch(&self.batch).map_err(SeedError::Store)?;
        self.outcome.batches += 1;
        log::debug!(
            "seeder committed batch {} ({} rows so far)",
            self.outcome.batches,
            self.outcome.inserted
        );
        self.batch.clear();
        Ok(())
    }
}

impl<'de> DeserializeSeed<'de> for &mut BatchSink<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for &mut BatchSink<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("an array of catalog entries")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(row) = seq.next_element::<NewEntry>()? {
            self.batch.push(row);
            if self.batch.len() == SEED_BATCH_SIZE {
                if let Err(err) = self.flush() {
                    self.store_failure = Some(err);
                    return Err(de::Error::custom("catalog store rejected a batch"));
                }
            }
        }
        if let Err(err) = self.flush() {
            self.store_failure = Some(err);
            return Err(de::Error::custom("catalog store rejected a batch"));
        }
        Ok(())
    }
}
