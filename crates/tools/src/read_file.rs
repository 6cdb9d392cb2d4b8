//! Read file tool — return the text of a workspace file.

use async_trait::async_trait;
use memweave_core::error::ToolError;
use memweave_core::tool::{Tool, ToolResult};
use std::sync::Arc;

use crate::sandbox::Workspace;
use crate::text_arg;

pub struct ReadFileTool {
    workspace: Arc<Workspace>,
}

impl ReadFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file in the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "The name of the file to read"
                }
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let filename = text_arg(&arguments, "filename")?;
        let path = self
            .workspace
            .resolve(&filename)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ToolResult::failed(
                format!("Error: File '{filename}' not found."),
            )),
            Err(e) => Ok(ToolResult::failed(format!(
                "Error reading file '{filename}': {e}"
            ))),
        }
    }
}
