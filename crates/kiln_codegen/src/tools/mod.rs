//! Tools the project generator can call.
//!
//! Every tool is scoped to one project root,
//! `{output_dir}/vue_project_{app_id}`. Failures are returned to the model
//! as text so it can correct itself; they never abort the stream.

mod delete_file;
mod read_dir;
mod read_file;
mod write_file;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use kiln_core::{AppId, GenerationType, RequestContext};

pub use delete_file::DeleteFileTool;
pub use read_dir::ReadDirTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

use crate::model::ToolCall;

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by.
    fn name(&self) -> &'static str;

    /// Name shown to users.
    fn display_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Run the tool. The returned text goes back to the model.
    async fn execute(&self, project_root: &Path, arguments: &Value) -> String;

    /// Human-readable rendering of a finished call.
    fn render_executed(&self, _arguments: &Value) -> String {
        format!("[tool call] {}", self.display_name())
    }
}

/// The tools bound to one project.
pub struct ToolSet {
    project_root: PathBuf,
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    /// Empty tool set rooted at `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            tools: Vec::new(),
        }
    }

    /// The standard project tools for an application.
    pub fn for_project(output_dir: &Path, app_id: AppId) -> Self {
        Self::new(output_dir.join(GenerationType::MultiStepProject.dir_name(app_id)))
            .with(Arc::new(WriteFileTool))
            .with(Arc::new(ReadFileTool))
            .with(Arc::new(ReadDirTool))
            .with(Arc::new(DeleteFileTool))
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Function definitions in the chat-completions `tools` format.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters(),
                    }
                })
            })
            .collect()
    }

    /// Execute a call. Unknown tools and malformed arguments produce an error text.
    pub async fn execute(&self, ctx: &RequestContext, call: &ToolCall) -> String {
        let Some(tool) = self.get(&call.name) else {
            warn!(app_id = ctx.app_id, "Model called unknown tool {}", call.name);
            return format!("Error: there is no tool called {}", call.name);
        };

        let arguments = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => return format!("Error: invalid arguments for {}: {}", call.name, e),
        };

        debug!(
            app_id = ctx.app_id,
            request_id = %ctx.request_id,
            "Executing tool {} ({})",
            call.name,
            call.id
        );
        tool.execute(&self.project_root, &arguments).await
    }

    /// Announcement shown when the model first selects a tool.
    pub fn render_selected(&self, name: &str) -> String {
        let display = self.get(name).map(|t| t.display_name()).unwrap_or(name);
        format!("\n\n[tool selected] {}\n\n", display)
    }

    /// Block shown once a tool call has run.
    pub fn render_executed(&self, name: &str, arguments: &str) -> String {
        let body = match (self.get(name), parse_arguments(arguments)) {
            (Some(tool), Ok(args)) => tool.render_executed(&args),
            _ => format!("[tool call] {}", name),
        };
        format!("\n\n{}\n\n", body)
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("project_root", &self.project_root)
            .field("tools", &self.names())
            .finish()
    }
}

fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}

/// Resolve a model-supplied relative path inside the project root.
pub(crate) fn resolve_in_root(root: &Path, relative: &str) -> Result<PathBuf, String> {
    let relative = Path::new(relative.trim());
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => {
                return Err(format!(
                    "path {} must stay inside the project",
                    relative.display()
                ))
            }
        }
    }
    Ok(resolved)
}

/// Fetch a string argument.
pub(crate) fn str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str)
}
