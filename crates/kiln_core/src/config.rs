//! Workspace configuration.
//!
//! Settings live in `<workspace>/.kiln/settings.json`. Every field has a
//! default, so a missing file or a partial file is fine; selected values can be
//! overridden from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

pub const STATE_DIR: &str = ".kiln";
pub const SETTINGS_FILE: &str = "settings.json";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KilnConfig {
    /// Root for generated artifacts
    pub output_dir: PathBuf,
    /// Root for deployed sites
    pub deploy_dir: PathBuf,
    /// Root for history, execution logs and other state
    pub state_dir: PathBuf,
    pub cache: CacheConfig,
    pub memory: MemoryConfig,
    pub generation: GenerationConfig,
    pub workflow: WorkflowConfig,
    pub build: BuildConfig,
    pub llm: LlmConfig,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tmp/code_output"),
            deploy_dir: PathBuf::from("tmp/code_deploy"),
            state_dir: PathBuf::from(STATE_DIR),
            cache: CacheConfig::default(),
            memory: MemoryConfig::default(),
            generation: GenerationConfig::default(),
            workflow: WorkflowConfig::default(),
            build: BuildConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Generator session cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub max_capacity: u64,
    /// Absolute age limit since creation
    pub time_to_live_secs: u64,
    /// Idle limit since last access
    pub time_to_idle_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            time_to_live_secs: 30 * 60,
            time_to_idle_secs: 10 * 60,
        }
    }
}

impl CacheConfig {
    pub fn time_to_live(&self) -> Duration {
        Duration::from_secs(self.time_to_live_secs)
    }

    pub fn time_to_idle(&self) -> Duration {
        Duration::from_secs(self.time_to_idle_secs)
    }
}

/// Conversation memory window and history reload sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryConfig {
    pub max_messages: usize,
    pub text_history_turns: usize,
    pub project_history_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            text_history_turns: 20,
            project_history_turns: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Upper bound on tool calls within one project generation
    pub max_tool_invocations: usize,
    /// Text types stream by default; `false` selects the structured call
    pub stream_mode: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tool_invocations: 30,
            stream_mode: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowConfig {
    pub max_quality_retries: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_quality_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    pub install_timeout_secs: u64,
    pub build_timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            install_timeout_secs: 300,
            build_timeout_secs: 180,
        }
    }
}

/// Model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            max_retries: 3,
            request_timeout_secs: 300,
        }
    }
}

impl KilnConfig {
    /// Load settings for a workspace, then apply environment overrides.
    pub fn load(workspace_root: &Path) -> CoreResult<Self> {
        let mut config = Self::from_settings(workspace_root)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.resolve_paths(workspace_root);
        Ok(config)
    }

    /// Read `.kiln/settings.json`, falling back to defaults when it does not exist.
    pub fn from_settings(workspace_root: &Path) -> CoreResult<Self> {
        let settings_path = workspace_root.join(STATE_DIR).join(SETTINGS_FILE);
        if !settings_path.exists() {
            debug!("No settings at {:?}, using defaults", settings_path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&settings_path)?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("invalid settings file {}: {}", settings_path.display(), e))
        })
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("KILN_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("KILN_DEPLOY_DIR") {
            self.deploy_dir = PathBuf::from(dir);
        }
        if let Some(model) = lookup("KILN_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("KILN_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(key);
        }
    }

    /// Anchor relative directories at the workspace root.
    pub fn resolve_paths(&mut self, workspace_root: &Path) {
        for dir in [&mut self.output_dir, &mut self.deploy_dir, &mut self.state_dir] {
            if dir.is_relative() {
                *dir = workspace_root.join(&*dir);
            }
        }
    }

    /// Directory holding execution logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Directory holding chat history stores.
    pub fn history_dir(&self) -> PathBuf {
        self.state_dir.join("history")
    }
}
