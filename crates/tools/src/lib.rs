//! Built-in tool implementations for Memweave.
//!
//! Three tools operate on files in a single workspace directory:
//! `list_files`, `read_file` and `write_file`. Every filename is reduced to
//! its final component before use, so a tool can never reach outside the
//! workspace. Failures come back as result text, never as a panic.

pub mod list_files;
pub mod read_file;
pub mod sandbox;
pub mod write_file;

use memweave_core::error::ToolError;
use memweave_core::knowledge::scalar_text;
use memweave_core::tool::ToolRegistry;
use std::sync::Arc;

pub use sandbox::{SandboxError, Workspace};

/// Create the tool registry for a workspace.
pub fn default_registry(workspace: Arc<Workspace>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(list_files::ListFilesTool::new(workspace.clone())));
    registry.register(Box::new(read_file::ReadFileTool::new(workspace.clone())));
    registry.register(Box::new(write_file::WriteFileTool::new(workspace)));
    registry
}

/// Read a scalar argument as text. Numbers and booleans are stringified.
pub(crate) fn text_arg(arguments: &serde_json::Value, key: &str) -> Result<String, ToolError> {
    arguments
        .get(key)
        .and_then(scalar_text)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}
