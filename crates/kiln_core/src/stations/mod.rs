//! Station implementations for the code generation pipeline.
//!
//! One station per graph node. Stations hold their collaborators behind
//! `Arc<dyn Trait>` so a single registry serves every concurrent run.

mod code_generation;
mod image_collection;
mod project_build;
mod prompt_enhancement;
mod quality_check;
mod routing;

use std::sync::Arc;

pub use code_generation::CodeGenerationStation;
pub use image_collection::ImageCollectionStation;
pub use project_build::ProjectBuildStation;
pub use prompt_enhancement::PromptEnhancementStation;
pub use quality_check::QualityCheckStation;
pub use routing::RoutingStation;

use crate::registry::StationRegistry;
use crate::services::{
    CodeGenerator, GenerationRouter, ImageCollector, ImageListEnhancer, KeywordRouter,
    NoImageCollector, ProjectBuilder, PromptEnhancer, QualityValidator,
};

/// Collaborators needed to assemble the full pipeline.
#[derive(Clone)]
pub struct PipelineServices {
    pub images: Arc<dyn ImageCollector>,
    pub enhancer: Arc<dyn PromptEnhancer>,
    pub router: Arc<dyn GenerationRouter>,
    pub generator: Arc<dyn CodeGenerator>,
    pub validator: Arc<dyn QualityValidator>,
    pub builder: Arc<dyn ProjectBuilder>,
}

impl PipelineServices {
    /// Services with default image, enhancement and routing collaborators.
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        validator: Arc<dyn QualityValidator>,
        builder: Arc<dyn ProjectBuilder>,
    ) -> Self {
        Self {
            images: Arc::new(NoImageCollector),
            enhancer: Arc::new(ImageListEnhancer),
            router: Arc::new(KeywordRouter),
            generator,
            validator,
            builder,
        }
    }

    pub fn with_images(mut self, images: Arc<dyn ImageCollector>) -> Self {
        self.images = images;
        self
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn PromptEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn with_router(mut self, router: Arc<dyn GenerationRouter>) -> Self {
        self.router = router;
        self
    }
}

/// Create a registry holding every pipeline station.
pub fn create_pipeline_registry(services: PipelineServices) -> StationRegistry {
    let mut registry = StationRegistry::new();
    registry.register(Arc::new(ImageCollectionStation::new(services.images)));
    registry.register(Arc::new(PromptEnhancementStation::new(services.enhancer)));
    registry.register(Arc::new(RoutingStation::new(services.router)));
    registry.register(Arc::new(CodeGenerationStation::new(services.generator)));
    registry.register(Arc::new(QualityCheckStation::new(services.validator)));
    registry.register(Arc::new(ProjectBuildStation::new(services.builder)));
    registry
}
