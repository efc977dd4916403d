use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::context::WorkflowContext;
use crate::error::{CoreError, CoreResult};
use crate::services::CodeGenerator;
use crate::station::{Station, StationResult};

/// Generates code for the resolved type. On a quality retry the prompt
/// carries every finding accumulated so far.
pub struct CodeGenerationStation {
    generator: Arc<dyn CodeGenerator>,
}

impl CodeGenerationStation {
    pub fn new(generator: Arc<dyn CodeGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Station for CodeGenerationStation {
    fn name(&self) -> &str {
        "code_generation"
    }

    fn description(&self) -> &str {
        "Generates code through the generation dispatcher"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
        let generation_type = context
            .generation_type
            .ok_or_else(|| CoreError::GenerationTypeMissing(self.name().to_string()))?;
        let prompt = context.generation_prompt();

        info!(
            "Generating {} (attempt {})",
            generation_type.label(),
            context.generation_attempts + 1
        );
        let dir = self
            .generator
            .generate(&context.request, generation_type, &prompt)
            .await?;

        context.generation_attempts += 1;
        let message = format!("code written to {}", dir.display());
        context.generated_code_dir = Some(dir);
        Ok(StationResult::success(self.name()).with_message(message))
    }
}
