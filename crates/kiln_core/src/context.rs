//! Workflow context carried through the generation pipeline.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{GenerationType, ImageResource, QualityResult, RequestContext};

/// Shared mutable state for one pipeline run.
///
/// Stages run strictly one after another, so each stage gets exclusive
/// `&mut` access while it executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Unique execution ID
    pub execution_id: Uuid,
    /// Who asked, for which app
    pub request: RequestContext,
    /// Name of the stage currently executing (or last executed)
    pub current_step: Option<String>,
    /// Prompt as the user wrote it
    pub original_prompt: String,
    /// Prompt after enrichment; falls back to the original
    pub enhanced_prompt: Option<String>,
    /// Resolved by routing; may be preset by the caller
    pub generation_type: Option<GenerationType>,
    /// Images gathered by the best-effort collection stage
    pub images: Vec<ImageResource>,
    /// Directory holding the generated artifact
    pub generated_code_dir: Option<PathBuf>,
    /// Build output (`dist`) when a build ran and succeeded
    pub build_result_dir: Option<PathBuf>,
    /// Latest verdict from the quality gate
    pub quality_result: Option<QualityResult>,
    /// Number of times the quality gate sent the run back to code generation
    pub quality_check_count: u32,
    /// Findings from every failed quality check, oldest first
    pub quality_feedback: Vec<String>,
    /// Number of completed code generation attempts
    pub generation_attempts: u32,
    /// Additional metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl WorkflowContext {
    /// Create a new workflow context.
    pub fn new(request: RequestContext, prompt: impl Into<String>) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            request,
            current_step: None,
            original_prompt: prompt.into(),
            enhanced_prompt: None,
            generation_type: None,
            images: Vec::new(),
            generated_code_dir: None,
            build_result_dir: None,
            quality_result: None,
            quality_check_count: 0,
            quality_feedback: Vec::new(),
            generation_attempts: 0,
            metadata: HashMap::new(),
        }
    }

    /// Preset the generation type, skipping automatic routing.
    pub fn with_generation_type(mut self, generation_type: GenerationType) -> Self {
        self.generation_type = Some(generation_type);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Prompt to send to code generation: the enhanced prompt when present.
    pub fn working_prompt(&self) -> &str {
        self.enhanced_prompt.as_deref().unwrap_or(&self.original_prompt)
    }

    /// Working prompt plus all quality feedback accumulated so far.
    pub fn generation_prompt(&self) -> String {
        let prompt = self.working_prompt();
        if self.quality_feedback.is_empty() {
            return prompt.to_string();
        }

        let mut out = String::from(prompt);
        out.push_str("\n\n## Issues found by the previous quality check, fix all of them\n");
        for finding in &self.quality_feedback {
            out.push_str("- ");
            out.push_str(finding);
            out.push('\n');
        }
        out
    }

    /// Record a failing quality verdict so the next generation attempt sees it.
    pub fn record_quality_feedback(&mut self, result: &QualityResult) {
        self.quality_feedback.extend(result.errors.iter().cloned());
        self.quality_feedback
            .extend(result.suggestions.iter().map(|s| format!("suggestion: {}", s)));
    }

    pub fn get_metadata<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.metadata
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
