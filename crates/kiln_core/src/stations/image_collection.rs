use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::WorkflowContext;
use crate::error::CoreResult;
use crate::services::ImageCollector;
use crate::station::{LogEntry, Station, StationResult};

/// Best-effort image gathering. Never fails the run: a collector error
/// leaves the context with an empty image set.
pub struct ImageCollectionStation {
    collector: Arc<dyn ImageCollector>,
}

impl ImageCollectionStation {
    pub fn new(collector: Arc<dyn ImageCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Station for ImageCollectionStation {
    fn name(&self) -> &str {
        "image_collection"
    }

    fn description(&self) -> &str {
        "Collects images that can enrich the generated page"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
        match self.collector.collect(&context.request, &context.original_prompt).await {
            Ok(images) => {
                info!("Collected {} images", images.len());
                let count = images.len();
                context.images = images;
                Ok(StationResult::success(self.name())
                    .with_message(format!("collected {} images", count)))
            }
            Err(e) => {
                warn!("Image collection failed, continuing without images: {}", e);
                context.images.clear();
                Ok(StationResult::success(self.name())
                    .with_log(LogEntry::warn(format!("image collection skipped: {}", e))))
            }
        }
    }
}
