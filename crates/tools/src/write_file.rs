//! Write file tool — create or overwrite a workspace file.

use async_trait::async_trait;
use memweave_core::error::ToolError;
use memweave_core::tool::{Tool, ToolResult};
use std::sync::Arc;

use crate::sandbox::Workspace;
use crate::text_arg;

pub struct WriteFileTool {
    workspace: Arc<Workspace>,
}

impl WriteFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating or overwriting it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "The name of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write into the file"
                }
            },
            "required": ["filename", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let filename = text_arg(&arguments, "filename")?;
        let content = text_arg(&arguments, "content")?;
        let path = self
            .workspace
            .resolve(&filename)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        match tokio::fs::write(&path, &content).await {
            Ok(()) => Ok(ToolResult::ok(format!(
                "Success: Content written to '{filename}'."
            ))),
            Err(e) => Ok(ToolResult::failed(format!(
                "Error writing to file '{filename}': {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_in(dir: &std::path::Path) -> WriteFileTool {
        WriteFileTool::new(Arc::new(Workspace::new(dir)))
    }

    #[tokio::test]
    async fn write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool_in(dir.path())
            .execute(serde_json::json!({"filename": "out.txt", "content": "Hello from memweave!"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "Success: Content written to 'out.txt'.");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt")).unwrap(),
            "Hello from memweave!"
        );
    }

    #[tokio::test]
    async fn write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.txt"), "old").unwrap();

        tool_in(dir.path())
            .execute(serde_json::json!({"filename": "out.txt", "content": "new"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn traversal_writes_inside_workspace() {
        let outer = tempfile::tempdir().unwrap();
        let ws = outer.path().join("ws");
        std::fs::create_dir(&ws).unwrap();

        let result = tool_in(&ws)
            .execute(serde_json::json!({"filename": "../../escape.txt", "content": "x"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(ws.join("escape.txt").exists());
        assert!(!outer.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn missing_content_argument() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool_in(dir.path())
            .execute(serde_json::json!({"filename": "x.txt"}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
