//! # kiln_core
//!
//! Domain types, configuration and the code generation workflow engine.
//!
//! # Architecture
//!
//! - **Types**: generation types, session keys and the explicit request context
//! - **Graph**: the fixed pipeline topology and its pure edge decisions
//! - **Stations**: one implementation per pipeline node
//! - **Services**: collaborator traits the stations delegate to
//! - **Executor**: walks the graph with execution-log persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln_core::{
//!     create_pipeline_registry, PipelineServices, RequestContext, WorkflowContext, WorkflowExecutor,
//! };
//!
//! let services = PipelineServices::new(generator, validator, builder);
//! let executor = WorkflowExecutor::new(Arc::new(create_pipeline_registry(services)))
//!     .with_log_dir(config.logs_dir());
//!
//! let context = WorkflowContext::new(RequestContext::new(user_id, app_id), "a pricing page");
//! let log = executor.execute(context).await?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod registry;
pub mod services;
pub mod station;
pub mod stations;
pub mod types;

// Re-export main types for convenience
pub use config::KilnConfig;
pub use context::WorkflowContext;
pub use error::{CoreError, CoreResult};
pub use executor::{ExecutionLog, ExecutionLogEntry, ExecutionState, WorkflowEvent, WorkflowExecutor};
pub use graph::{route_after_quality_check, route_build_or_skip, Node, QualityEdge, Transition, MAX_QUALITY_RETRIES};
pub use registry::StationRegistry;
pub use services::{
    CodeGenerator, GenerationRouter, ImageCollector, ImageListEnhancer, KeywordRouter,
    NoImageCollector, ProjectBuilder, PromptEnhancer, QualityValidator,
};
pub use station::{LogEntry, LogLevel, Station, StationResult};
pub use stations::{create_pipeline_registry, PipelineServices};
pub use types::{
    AppId, GenerationType, ImageCategory, ImageResource, QualityResult, RequestContext, SessionKey,
};
