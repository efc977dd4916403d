//! npm builds of generated projects.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use kiln_core::config::BuildConfig;
use kiln_core::{ProjectBuilder, RequestContext};

use crate::command::run_command;
use crate::error::{RunnerError, RunnerResult};
use crate::status::{BuildStatus, BuildStatusEvent, BuildStatusSink};

/// Directory the build writes to, relative to the project.
pub const DIST_DIR: &str = "dist";

/// The npm executable for this platform.
pub fn default_npm_program() -> &'static str {
    if cfg!(windows) {
        "npm.cmd"
    } else {
        "npm"
    }
}

/// Runs `npm install` then `npm run build` in a generated project.
pub struct NpmProjectBuilder {
    program: String,
    install_timeout: Duration,
    build_timeout: Duration,
    sink: Arc<dyn BuildStatusSink>,
}

impl NpmProjectBuilder {
    pub fn new(config: &BuildConfig, sink: Arc<dyn BuildStatusSink>) -> Self {
        Self {
            program: default_npm_program().to_string(),
            install_timeout: Duration::from_secs(config.install_timeout_secs),
            build_timeout: Duration::from_secs(config.build_timeout_secs),
            sink,
        }
    }

    /// Use another npm-compatible executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeouts(mut self, install: Duration, build: Duration) -> Self {
        self.install_timeout = install;
        self.build_timeout = build;
        self
    }

    /// Install and build; returns the `dist` directory.
    pub async fn build_project(&self, project_dir: &Path) -> RunnerResult<PathBuf> {
        let manifest = project_dir.join("package.json");
        if !manifest.is_file() {
            return Err(RunnerError::MissingProjectFile(manifest));
        }

        run_command(project_dir, &self.program, &["install"], self.install_timeout)
            .await?
            .check()?;
        run_command(project_dir, &self.program, &["run", "build"], self.build_timeout)
            .await?
            .check()?;

        let dist = project_dir.join(DIST_DIR);
        if !dist.is_dir() {
            return Err(RunnerError::MissingOutput(dist));
        }
        Ok(dist)
    }

    /// Build with status notifications. Failures are reported to the sink
    /// and never propagated.
    pub async fn build_and_report(&self, ctx: &RequestContext, project_dir: &Path) -> Option<PathBuf> {
        self.sink
            .publish(BuildStatusEvent::new(ctx, BuildStatus::BuildStarted));
        info!(
            app_id = ctx.app_id,
            request_id = %ctx.request_id,
            "Building project in {}",
            project_dir.display()
        );

        match self.build_project(project_dir).await {
            Ok(dist) => {
                info!(app_id = ctx.app_id, "Build output ready in {}", dist.display());
                self.sink
                    .publish(BuildStatusEvent::new(ctx, BuildStatus::BuildSuccess));
                Some(dist)
            }
            Err(e) => {
                error!(app_id = ctx.app_id, "Build failed: {}", e);
                self.sink.publish(BuildStatusEvent::new(
                    ctx,
                    BuildStatus::BuildFailure {
                        reason: e.to_string(),
                    },
                ));
                None
            }
        }
    }

    /// Run the build on a worker task; the caller may ignore the handle.
    pub fn build_in_background(
        self: Arc<Self>,
        ctx: RequestContext,
        project_dir: PathBuf,
    ) -> JoinHandle<Option<PathBuf>> {
        tokio::spawn(async move { self.build_and_report(&ctx, &project_dir).await })
    }
}

#[async_trait]
impl ProjectBuilder for NpmProjectBuilder {
    async fn build(&self, ctx: &RequestContext, project_dir: &Path) -> bool {
        self.build_and_report(ctx, project_dir).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{MockBuildStatusSink, RecordingStatusSink};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_manifest_fails_before_npm() {
        let temp = TempDir::new().unwrap();
        let sink = RecordingStatusSink::new();
        let builder = NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(sink.clone()))
            .with_program("kiln-no-such-npm");

        let built = builder
            .build(&RequestContext::new(1, 9), temp.path())
            .await;

        assert!(!built);
        let statuses = sink.statuses();
        assert_eq!(statuses[0], BuildStatus::BuildStarted);
        assert!(matches!(
            &statuses[1],
            BuildStatus::BuildFailure { reason } if reason.contains("package.json")
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), "{}").unwrap();

        let mut sink = MockBuildStatusSink::new();
        sink.expect_publish()
            .withf(|e| e.app_id == 4)
            .times(2)
            .return_const(());
        let builder = NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(sink))
            .with_program("kiln-no-such-npm");

        let result = builder
            .build_and_report(&RequestContext::new(1, 4), temp.path())
            .await;
        assert!(result.is_none());
    }

    #[test]
    fn test_default_timeouts() {
        let builder = NpmProjectBuilder::new(&BuildConfig::default(), Arc::new(RecordingStatusSink::new()));
        assert_eq!(builder.install_timeout, Duration::from_secs(300));
        assert_eq!(builder.build_timeout, Duration::from_secs(180));
    }
}
