use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::WorkflowContext;
use crate::error::CoreResult;
use crate::services::ProjectBuilder;
use crate::station::{LogEntry, Station, StationResult};

/// Builds the generated project. Build failures are reported by the
/// builder's status channel and do not fail the run.
pub struct ProjectBuildStation {
    builder: Arc<dyn ProjectBuilder>,
}

impl ProjectBuildStation {
    pub fn new(builder: Arc<dyn ProjectBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Station for ProjectBuildStation {
    fn name(&self) -> &str {
        "project_build"
    }

    fn description(&self) -> &str {
        "Installs dependencies and builds the generated project"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
        let Some(dir) = context.generated_code_dir.clone() else {
            warn!("No project directory to build");
            return Ok(StationResult::success(self.name())
                .with_log(LogEntry::warn("no project directory, build skipped")));
        };

        if self.builder.build(&context.request, &dir).await {
            let dist = dir.join("dist");
            info!("Project built: {:?}", dist);
            context.build_result_dir = Some(dist);
            Ok(StationResult::success(self.name()).with_message("build succeeded"))
        } else {
            context.build_result_dir = None;
            Ok(StationResult::success(self.name())
                .with_message("build failed")
                .with_log(LogEntry::warn("build failed, see build status")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockProjectBuilder;
    use crate::types::RequestContext;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_build_outcome_never_fails_run() {
        for ok in [true, false] {
            let mut builder = MockProjectBuilder::new();
            builder.expect_build().times(1).returning(move |_, _| ok);
            let station = ProjectBuildStation::new(Arc::new(builder));
            let mut ctx = WorkflowContext::new(RequestContext::new(1, 4), "shop");
            ctx.generated_code_dir = Some(PathBuf::from("/out/vue_project_4"));

            let result = station.execute(&mut ctx).await.unwrap();

            assert!(result.success);
            assert_eq!(
                ctx.build_result_dir,
                ok.then(|| PathBuf::from("/out/vue_project_4/dist"))
            );
        }
    }
}
