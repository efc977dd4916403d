use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{resolve_in_root, str_arg, Tool};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "readFile"
    }

    fn display_name(&self) -> &'static str {
        "Read file"
    }

    fn description(&self) -> &'static str {
        "Read the content of a file relative to the project root"
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
        let path = match resolve_in_root(project_root, relative) {
            Ok(path) => path,
            Err(e) => return format!("Error: {}", e),
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => format!("Error: cannot read {}: {}", relative, e),
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_existing_and_missing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), "{\"name\":\"demo\"}").unwrap();

        let found = ReadFileTool
            .execute(temp.path(), &json!({"relativeFilePath": "package.json"}))
            .await;
        assert_eq!(found, "{\"name\":\"demo\"}");

        let missing = ReadFileTool
            .execute(temp.path(), &json!({"relativeFilePath": "nope.txt"}))
            .await;
        assert!(missing.starts_with("Error: cannot read nope.txt"));
    }
}
