use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};

use super::{resolve_in_root, str_arg, Tool};

/// Writes a file, creating parent directories and truncating existing content.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "writeFile"
    }

    fn display_name(&self) -> &'static str {
        "Write file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file at a path relative to the project root"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeFilePath": {"type": "string", "description": "File path relative to the project root"},
                "content": {"type": "string", "description": "Full file content"}
            },
            "required": ["relativeFilePath", "content"]
        })
    }

    async fn execute(&self, project_root: &Path, arguments: &Value) -> String {
        let Some(relative) = str_arg(arguments, "relativeFilePath") else {
            return "Error: relativeFilePath is required".to_string();
        };
        let content = str_arg(arguments, "content").unwrap_or_default();

        let path = match resolve_in_root(project_root, relative) {
            Ok(path) => path,
            Err(e) => return format!("Error: {}", e),
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!("Failed to create {:?}: {}", parent, e);
                return format!("Failed to write file {}: {}", relative, e);
            }
        }
        match tokio::fs::write(&path, content).await {
            Ok(()) => {
                info!("Wrote file {:?}", path);
                format!("File written: {}", relative)
            }
            Err(e) => {
                error!("Failed to write {:?}: {}", path, e);
                format!("Failed to write file {}: {}", relative, e)
            }
        }
    }

    fn render_executed(&self, arguments: &Value) -> String {
        let relative = str_arg(arguments, "relativeFilePath").unwrap_or_default();
        let suffix = Path::new(relative)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = str_arg(arguments, "content").unwrap_or_default();
        format!(
            "[tool call] {} {}\n```{}\n{}\n```",
            self.display_name(),
            relative,
            suffix,
            content
        )
    }
}
