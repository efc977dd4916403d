use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::{DirEntry, WalkDir};

use super::{resolve_in_root, str_arg, Tool};

const IGNORED_NAMES: [&str; 11] = [
    "node_modules", ".git", "dist", "build", ".DS_Store", ".env", "target", ".mvn", ".idea",
    ".vscode", "coverage",
];

const IGNORED_EXTENSIONS: [&str; 4] = [".log", ".tmp", ".cache", ".lock"];

/// Lists the project tree, skipping build output, dependencies and tooling noise.
pub struct ReadDirTool;

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    IGNORED_NAMES.contains(&&*name)
        || (entry.file_type().is_file() && IGNORED_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

/// Indented listing of `dir`, directories suffixed with `/`.
fn render_tree(dir: &Path) -> String {
    let mut entries: Vec<(usize, PathBuf, bool)> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
        .filter_map(|e| e.ok())
        .map(|e| (e.depth(), e.path().to_path_buf(), e.file_type().is_dir()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut out = String::from("Project structure:\n");
    for (depth, path, is_dir) in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        out.push_str(&"  ".repeat(depth - 1));
        out.push_str(&name);
        if is_dir {
            out.push('/');
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl Tool for ReadDirTool {
    fn name(&self) -> &'static str {
        "readDir"
    }

    fn display_name(&self) -> &'static str {
        "Read directory"
    }

    fn description(&self) -> &'static str {
        "Read the directory structure; an empty path reads the whole project"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "relativeDirPath": {"type": "string", "description": "Directory relative to the project root, empty for the root"}
            }
        })
    }

    async fn execute(&self, project_root: &Path, arguments: &Value) -> String {
        let relative = str_arg(arguments, "relativeDirPath").unwrap_or_default().to_string();
        let dir = match resolve_in_root(project_root, &relative) {
            Ok(dir) => dir,
            Err(e) => return format!("Error: {}", e),
        };
        if !dir.is_dir() {
            return format!("Error: directory does not exist - {}", relative);
        }

        match tokio::task::spawn_blocking(move || render_tree(&dir)).await {
            Ok(tree) => tree,
            Err(e) => format!("Error: failed to read directory {}: {}", relative, e),
        }
    }

    fn render_executed(&self, arguments: &Value) -> String {
        let relative = str_arg(arguments, "relativeDirPath").unwrap_or_default();
        let shown = if relative.is_empty() { "/" } else { relative };
        format!("[tool call] {} {}", self.display_name(), shown)
    }
}
