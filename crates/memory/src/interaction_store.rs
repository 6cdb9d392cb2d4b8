//! The interaction journal: a JSON array of every exchange, oldest first.
//!
//! Storage location: `~/.memweave/memory/episodic_journal.json`
//!
//! Every append reads the whole file, pushes the new record and rewrites
//! the file. The journal is small and human-inspectable; nothing is ever
//! reordered or deduplicated.

use memweave_core::error::StoreError;
use memweave_core::interaction::{self, InteractionRecord};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::fs;

/// File-backed, append-only journal of exchanges.
pub struct InteractionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl InteractionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in the file, parsed or not.
    ///
    /// A missing file, a non-array document or an unparsable file reads as
    /// an empty journal.
    fn load_entries(path: &Path) -> Vec<Value> {
        match fs::read_json(path) {
            Some(Value::Array(items)) => items,
            Some(_) => {
                warn!(path = %path.display(), "Journal is not a JSON array, treating as empty");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Load every readable record from disk. Malformed entries are skipped
    /// here but stay in the file.
    fn load_from_disk(path: &Path) -> Vec<InteractionRecord> {
        Self::load_entries(path)
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<InteractionRecord>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable journal entry");
                    None
                }
            })
            .collect()
    }

    /// Append one record and persist the whole journal.
    ///
    /// Existing entries are written back exactly as they were read, including
    /// ones that do not parse as records. Returns the number of entries in
    /// the file after the append.
    pub async fn append(&self, record: InteractionRecord) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = Self::load_entries(&self.path);
        entries.push(serde_json::to_value(&record)?);

        let content = serde_json::to_string_pretty(&entries)?;
        fs::write_atomic(&self.path, &content)?;

        debug!(path = %self.path.display(), count = entries.len(), "Journal appended");
        Ok(entries.len())
    }

    /// Every record, oldest first.
    pub async fn all(&self) -> Vec<InteractionRecord> {
        Self::load_from_disk(&self.path)
    }

    /// The last `count` records, oldest first.
    pub async fn recent(&self, count: usize) -> Vec<InteractionRecord> {
        let records = Self::load_from_disk(&self.path);
        interaction::tail(&records, count).to_vec()
    }

    pub async fn len(&self) -> usize {
        Self::load_from_disk(&self.path).len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Replace the journal with an empty array.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        fs::write_atomic(&self.path, "[]")
    }
}
