use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{resolve_in_root, str_arg, Tool};

/// Files the project cannot work without.
const PROTECTED: [&str; 5] = ["package.json", "index.html", "vite.config.js", "src/main.js", "src/App.vue"];

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "deleteFile"
    }

    fn display_name(&self) -> &'static str {
        "Delete file"
    }

    fn description(&self) -> &'static str {
        "Delete a file relative to the project root"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeFilePath": {"type": "string", "description": "File path relative to the project root"}
            },
            "required": ["relativeFilePath"]
        })
    }

    async fn execute(&self, project_root: &Path, arguments: &Value) -> String {
        let Some(relative) = str_arg(arguments, "relativeFilePath") else {
            return "Error: relativeFilePath is required".to_string();
        };
        let normalized = relative.trim().trim_start_matches("./");
        if PROTECTED.contains(&normalized) {
            return format!("Error: {} is required by the project and cannot be deleted", relative);
        }

        let path = match resolve_in_root(project_root, relative) {
            Ok(path) => path,
            Err(e) => return format!("Error: {}", e),
        };
        if !path.is_file() {
            return format!("Error: {} is not a file", relative);
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted file {:?}", path);
                format!("File deleted: {}", relative)
            }
            Err(e) => format!("Error: cannot delete {}: {}", relative, e),
        }
    }

    fn render_executed(&self, arguments: &Value) -> String {
        format!(
            "[tool call] {} {}",
            self.display_name(),
            str_arg(arguments, "relativeFilePath").unwrap_or_default()
        )
    }
}
