//! File helpers shared by both stores.

use memweave_core::error::StoreError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read a JSON document, returning `None` when the file is missing or does
/// not parse.
pub(crate) fn read_json(path: &Path) -> Option<serde_json::Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file unreadable, treating as empty");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file corrupted, treating as empty");
            None
        }
    }
}

/// Write `content` to a sibling temp file, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, content).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Create the memory directory and seed empty store files.
///
/// Existing files are left untouched.
pub fn ensure_initialized(journal_path: &Path, knowledge_path: &Path) -> Result<(), StoreError> {
    for (path, empty) in [(journal_path, "[]"), (knowledge_path, "{}")] {
        if path.exists() {
            continue;
        }
        write_atomic(path, empty)?;
        debug!(path = %path.display(), "Created empty store file");
    }
    Ok(())
}
