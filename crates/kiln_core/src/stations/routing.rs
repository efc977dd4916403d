use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::WorkflowContext;
use crate::error::CoreResult;
use crate::services::GenerationRouter;
use crate::station::{Station, StationResult};
use crate::types::GenerationType;

/// Resolves the generation type for the run.
///
/// A type preset on the context wins. Otherwise the router decides, and a
/// router failure falls back to a single HTML file.
pub struct RoutingStation {
    router: Arc<dyn GenerationRouter>,
}

impl RoutingStation {
    pub fn new(router: Arc<dyn GenerationRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Station for RoutingStation {
    fn name(&self) -> &str {
        "routing"
    }

    fn description(&self) -> &str {
        "Selects the generation type"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
        let generation_type = match context.generation_type {
            Some(preset) => preset,
            None => match self.router.route(&context.request, context.working_prompt()).await {
                Ok(routed) => routed,
                Err(e) => {
                    warn!("Routing failed, defaulting to single file: {}", e);
                    GenerationType::SingleFile
                }
            },
        };

        info!("Generation type for this run: {}", generation_type);
        context.generation_type = Some(generation_type);
        Ok(StationResult::success(self.name()).with_message(generation_type.as_str()))
    }
}
