//! The knowledge base file: one JSON object, overwritten wholesale.

use memweave_core::error::StoreError;
use memweave_core::knowledge::KnowledgeBase;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::fs;

/// File-backed store for the single `KnowledgeBase` of a process.
pub struct KnowledgeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Exclusive access to the knowledge file for a load-modify-save cycle.
///
/// Holding the guard keeps other writers in this process out until the
/// batch is saved.
pub struct KnowledgeGuard<'a> {
    store: &'a KnowledgeStore,
    _guard: MutexGuard<'a, ()>,
}

impl KnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the knowledge base. Missing or corrupt files load as empty.
    pub async fn load(&self) -> KnowledgeBase {
        Self::load_from_disk(&self.path)
    }

    fn load_from_disk(path: &Path) -> KnowledgeBase {
        let Some(value) = fs::read_json(path) else {
            return KnowledgeBase::new();
        };
        match KnowledgeBase::try_from(value) {
            Ok(kb) => kb,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Knowledge base unusable, treating as empty");
                KnowledgeBase::new()
            }
        }
    }

    /// Take the write lock for a load-modify-save cycle.
    pub async fn lock(&self) -> KnowledgeGuard<'_> {
        KnowledgeGuard {
            store: self,
            _guard: self.write_lock.lock().await,
        }
    }

    /// Overwrite the file with `kb`.
    pub async fn save(&self, kb: &KnowledgeBase) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        Self::write(&self.path, kb)
    }

    fn write(path: &Path, kb: &KnowledgeBase) -> Result<(), StoreError> {
        fs::write_atomic(path, &kb.to_pretty_json())?;
        debug!(path = %path.display(), keys = kb.root().len(), "Knowledge base saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.save(&KnowledgeBase::new()).await
    }
}

impl KnowledgeGuard<'_> {
    pub fn load(&self) -> KnowledgeBase {
        KnowledgeStore::load_from_disk(&self.store.path)
    }

    pub fn save(&self, kb: &KnowledgeBase) -> Result<(), StoreError> {
        KnowledgeStore::write(&self.store.path, kb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memweave_core::knowledge::{Fact, SynthesisAction};

    fn store_in(dir: &tempfile::TempDir) -> KnowledgeStore {
        KnowledgeStore::new(dir.path().join("semantic_knowledge_base.json"))
    }

    fn add_fact(path: &[&str], value: &str) -> SynthesisAction {
        SynthesisAction::AddFact {
            path: path.iter().map(|s| s.to_string()).collect(),
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut kb = KnowledgeBase::new();
        kb.apply(&add_fact(&["User", "name"], "Ada"));
        kb.apply(&SynthesisAction::AddToList {
            path: vec!["User".into(), "likes".into()],
            value: "tea".into(),
        });
        store.save(&kb).await.unwrap();

        let loaded = store_in(&dir).load().await;
        assert_eq!(loaded, kb);
        assert_eq!(
            loaded.get(&["User", "likes"]),
            Some(&Fact::List(vec!["tea".into()]))
        );
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.load().await.is_empty());

        std::fs::write(store.path(), "not json at all").unwrap();
        assert!(store.load().await.is_empty());

        std::fs::write(store.path(), "[1, 2, 3]").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn guarded_cycle_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        {
            let guard = store.lock().await;
            let mut kb = guard.load();
            kb.apply(&add_fact(&["Project"], "memweave"));
            guard.save(&kb).unwrap();
        }

        let kb = store.load().await;
        assert_eq!(kb.get(&["Project"]), Some(&Fact::Text("memweave".into())));
    }

    #[tokio::test]
    async fn file_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut kb = KnowledgeBase::new();
        kb.apply(&add_fact(&["A", "b"], "c"));
        store.save(&kb).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "{\n  \"A\": {\n    \"b\": \"c\"\n  }\n}");
    }

    #[tokio::test]
    async fn clear_writes_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut kb = KnowledgeBase::new();
        kb.apply(&add_fact(&["x"], "y"));
        store.save(&kb).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
    }
}
