use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::context::WorkflowContext;
use crate::error::CoreResult;
use crate::services::PromptEnhancer;
use crate::station::{LogEntry, Station, StationResult};

/// Rewrites the prompt with collected context; passes the original through
/// when the enhancer fails.
pub struct PromptEnhancementStation {
    enhancer: Arc<dyn PromptEnhancer>,
}

impl PromptEnhancementStation {
    pub fn new(enhancer: Arc<dyn PromptEnhancer>) -> Self {
        Self { enhancer }
    }
}

#[async_trait]
impl Station for PromptEnhancementStation {
    fn name(&self) -> &str {
        "prompt_enhancement"
    }

    fn description(&self) -> &str {
        "Augments the prompt with collected resources"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
        match self.enhancer.enhance(&context.original_prompt, &context.images).await {
            Ok(prompt) => {
                context.enhanced_prompt = Some(prompt);
                Ok(StationResult::success(self.name()))
            }
            Err(e) => {
                warn!("Prompt enhancement failed, using the original prompt: {}", e);
                context.enhanced_prompt = Some(context.original_prompt.clone());
                Ok(StationResult::success(self.name())
                    .with_log(LogEntry::warn(format!("enhancement skipped: {}", e))))
            }
        }
    }
}
