//! Workspace sandboxing for the file tools.
//!
//! A requested filename is reduced to its last path component and joined
//! onto the workspace root. `../../etc/passwd` becomes `<root>/passwd`.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Error returned when a filename has no usable final component.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Filename '{filename}' does not name a file")]
    NoFileName { filename: String },
}

/// The directory the tools are confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace directory if it does not exist.
    pub fn ensure_exists(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Resolve a model-supplied filename to a path inside the workspace.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, SandboxError> {
        let basename = basename(filename).ok_or_else(|| SandboxError::NoFileName {
            filename: filename.into(),
        })?;
        let path = self.root.join(basename);
        debug!(requested = filename, resolved = %path.display(), "Resolved workspace path");
        Ok(path)
    }
}

/// Final component of `filename`, treating both `/` and `\` as separators.
fn basename(filename: &str) -> Option<&str> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_stays_in_root() {
        let ws = Workspace::new("/srv/ws");
        assert_eq!(ws.resolve("notes.txt").unwrap(), PathBuf::from("/srv/ws/notes.txt"));
    }

    #[test]
    fn traversal_is_reduced_to_basename() {
        let ws = Workspace::new("/srv/ws");
        assert_eq!(ws.resolve("../../etc/passwd").unwrap(), PathBuf::from("/srv/ws/passwd"));
        assert_eq!(ws.resolve("/etc/shadow").unwrap(), PathBuf::from("/srv/ws/shadow"));
        assert_eq!(ws.resolve("..\\..\\boot.ini").unwrap(), PathBuf::from("/srv/ws/boot.ini"));
    }

    #[test]
    fn names_without_a_file_are_rejected() {
        let ws = Workspace::new("/srv/ws");
        for bad in ["", "..", ".", "dir/", "../"] {
            assert!(ws.resolve(bad).is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn ensure_exists_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("workspace"));
        ws.ensure_exists().unwrap();
        assert!(ws.root().is_dir());
    }
}
