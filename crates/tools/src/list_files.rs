//! List files tool — names of every entry in the workspace.

use async_trait::async_trait;
use memweave_core::error::ToolError;
use memweave_core::tool::{Tool, ToolResult};
use std::sync::Arc;

use crate::sandbox::Workspace;

pub struct ListFilesTool {
    workspace: Arc<Workspace>,
}

impl ListFilesTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn entry_names(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(self.workspace.root()).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List all files and directories in the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        match self.entry_names().await {
            Ok(names) if names.is_empty() => Ok(ToolResult::ok("The workspace directory is empty.")),
            Ok(names) => Ok(ToolResult::ok(format!(
                "Files in workspace:\n- {}",
                names.join("\n- ")
            ))),
            Err(e) => Ok(ToolResult::failed(format!("Error listing files: {e}"))),
        }
    }
}
