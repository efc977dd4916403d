//! Shared domain types: generation types, session keys and request context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Application identity. One application owns one conversation per generation type.
pub type AppId = i64;

/// The kind of front-end output a conversation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationType {
    /// One self-contained HTML file.
    #[serde(rename = "html")]
    SingleFile,
    /// `index.html`, `style.css` and `script.js`.
    #[serde(rename = "multi_file")]
    MultiFile,
    /// A scaffolded project written through tools and built with npm.
    #[serde(rename = "vue_project")]
    MultiStepProject,
}

impl GenerationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleFile => "html",
            Self::MultiFile => "multi_file",
            Self::MultiStepProject => "vue_project",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleFile => "single HTML file",
            Self::MultiFile => "multi-file HTML/CSS/JS",
            Self::MultiStepProject => "Vue project",
        }
    }

    /// Whether generated output has to go through a build step.
    pub fn needs_build(&self) -> bool {
        matches!(self, Self::MultiStepProject)
    }

    /// Whether generation for this type is driven by tool calls.
    pub fn uses_tools(&self) -> bool {
        matches!(self, Self::MultiStepProject)
    }

    /// Output directory name for the given id: `{type}_{id}`.
    pub fn dir_name(&self, id: impl fmt::Display) -> String {
        format!("{}_{}", self.as_str(), id)
    }

    pub fn all() -> [GenerationType; 3] {
        [Self::SingleFile, Self::MultiFile, Self::MultiStepProject]
    }
}

impl FromStr for GenerationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" | "single_file" => Ok(Self::SingleFile),
            "multi_file" => Ok(Self::MultiFile),
            "vue_project" | "multi_step_project" => Ok(Self::MultiStepProject),
            other => Err(CoreError::UnknownGenerationType(other.to_string())),
        }
    }
}

impl fmt::Display for GenerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one isolated generator: (application, generation type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_id: AppId,
    pub generation_type: GenerationType,
}

impl SessionKey {
    pub fn new(app_id: AppId, generation_type: GenerationType) -> Self {
        Self {
            app_id,
            generation_type,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.generation_type, self.app_id)
    }
}

/// Correlation identity for one user request.
///
/// Passed explicitly into every call that can log or call back, including work
/// that continues on spawned tasks after the caller has gone away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub user_id: i64,
    pub app_id: AppId,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(user_id: i64, app_id: AppId) -> Self {
        Self {
            user_id,
            app_id,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }
}

/// Category of a collected image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCategory {
    Content,
    Illustration,
    Architecture,
    Logo,
}

/// An image reference gathered to enrich the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResource {
    pub category: ImageCategory,
    pub description: String,
    pub url: String,
}

/// Verdict of the automated quality gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

impl QualityResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}
