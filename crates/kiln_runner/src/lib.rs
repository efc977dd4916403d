//! # kiln_runner
//!
//! Build and deploy support for generated projects.
//!
//! This crate provides:
//! - **Command execution**: subprocesses with piped output and a hard timeout
//! - **Project builds**: `npm install` + `npm run build` with status events
//! - **Status hub**: broadcast of build notifications to subscribers
//! - **Deployment**: copy of generated output into the deploy root
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln_runner::{BuildStatusHub, NpmProjectBuilder};
//!
//! let hub = BuildStatusHub::new();
//! let mut updates = hub.subscribe_app(ctx.app_id);
//! let builder = Arc::new(NpmProjectBuilder::new(&config.build, Arc::new(hub.clone())));
//!
//! builder.build_in_background(ctx, project_dir);
//! while let Some(event) = updates.recv().await {
//!     println!("{:?}", event.status);
//! }
//! ```

pub mod build;
pub mod command;
pub mod deploy;
pub mod error;
pub mod status;

pub use build::{default_npm_program, NpmProjectBuilder, DIST_DIR};
pub use command::{format_command, run_command, CommandOutput};
pub use deploy::{generate_deploy_key, Deployer, Deployment};
pub use error::{RunnerError, RunnerResult};
pub use status::{
    BuildStatus, BuildStatusEvent, BuildStatusHub, BuildStatusSink, BuildStatusSubscription,
    FanoutSink, LoggingStatusSink, RecordingStatusSink,
};
