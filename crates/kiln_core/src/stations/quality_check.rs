use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::WorkflowContext;
use crate::error::{CoreError, CoreResult};
use crate::services::QualityValidator;
use crate::station::{LogEntry, Station, StationResult};
use crate::types::QualityResult;

/// Runs the quality gate over the generated directory.
///
/// The verdict only drives the retry edge. A validator error is logged and
/// recorded as a passing verdict so a broken gate cannot stall the run.
pub struct QualityCheckStation {
    validator: Arc<dyn QualityValidator>,
}

impl QualityCheckStation {
    pub fn new(validator: Arc<dyn QualityValidator>) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Station for QualityCheckStation {
    fn name(&self) -> &str {
        "quality_check"
    }

    fn description(&self) -> &str {
        "Validates the generated code"
    }

    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
        let generation_type = context
            .generation_type
            .ok_or_else(|| CoreError::GenerationTypeMissing(self.name().to_string()))?;
        let Some(dir) = context.generated_code_dir.clone() else {
            context.quality_result = Some(QualityResult::invalid(vec![
                "no generated code directory".to_string(),
            ]));
            return Ok(StationResult::success(self.name()).with_message("nothing to check"));
        };

        let mut result = StationResult::success(self.name());
        let verdict = match self.validator.validate(generation_type, &dir).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Quality validator failed, accepting the artifact: {}", e);
                result = result.with_log(LogEntry::warn(format!("validator error: {}", e)));
                QualityResult::valid()
            }
        };

        info!(
            "Quality check: valid={} errors={}",
            verdict.is_valid,
            verdict.errors.len()
        );
        let summary = if verdict.is_valid {
            "passed".to_string()
        } else {
            format!("{} problems", verdict.errors.len())
        };
        context.quality_result = Some(verdict);
        Ok(result.with_message(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockQualityValidator;
    use crate::types::{GenerationType, RequestContext};
    use std::path::PathBuf;

    fn context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new(RequestContext::new(1, 1), "p")
            .with_generation_type(GenerationType::MultiFile);
        ctx.generated_code_dir = Some(PathBuf::from("/out/multi_file_1"));
        ctx
    }

    #[tokio::test]
    async fn test_records_verdict() {
        let mut validator = MockQualityValidator::new();
        validator
            .expect_validate()
            .returning(|_, _| Ok(QualityResult::invalid(vec!["empty style.css".into()])));
        let station = QualityCheckStation::new(Arc::new(validator));
        let mut ctx = context();

        station.execute(&mut ctx).await.unwrap();

        let verdict = ctx.quality_result.unwrap();
        assert!(!verdict.is_valid);
        assert_eq!(verdict.errors, vec!["empty style.css".to_string()]);
    }

    #[tokio::test]
    async fn test_validator_error_counts_as_valid() {
        let mut validator = MockQualityValidator::new();
        validator
            .expect_validate()
            .returning(|_, _| Err(CoreError::Collaborator("gate crashed".into())));
        let station = QualityCheckStation::new(Arc::new(validator));
        let mut ctx = context();

        let result = station.execute(&mut ctx).await.unwrap();

        assert!(ctx.quality_result.unwrap().is_valid);
        assert_eq!(result.logs.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_is_invalid() {
        let station = QualityCheckStation::new(Arc::new(MockQualityValidator::new()));
        let mut ctx = context();
        ctx.generated_code_dir = None;

        station.execute(&mut ctx).await.unwrap();

        assert!(!ctx.quality_result.unwrap().is_valid);
    }
}
