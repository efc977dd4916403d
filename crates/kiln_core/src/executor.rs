//! Pipeline executor with execution-log persistence and progress events.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::context::WorkflowContext;
use crate::error::{CoreError, CoreResult};
use crate::graph::{next_transition, route_after_quality_check, Node, QualityEdge, Transition, MAX_QUALITY_RETRIES};
use crate::registry::StationRegistry;
use crate::station::StationResult;

/// Run state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Run has not started
    #[default]
    Pending,
    /// Run is in progress
    Running,
    /// Run reached END
    Completed,
    /// Run aborted at a station
    Failed,
}

/// Execution log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub station: String,
    pub result: StationResult,
}

/// Persistent execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub execution_id: Uuid,
    pub state: ExecutionState,
    /// Stations in the order they ran, retries included
    pub steps: Vec<String>,
    pub results: Vec<ExecutionLogEntry>,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub completed_at: Option<chrono::DateTime<Utc>>,
    /// Error message if failed
    pub error: Option<String>,
    /// Context snapshot
    pub context: WorkflowContext,
}

impl ExecutionLog {
    pub fn new(context: WorkflowContext) -> Self {
        Self {
            execution_id: context.execution_id,
            state: ExecutionState::Pending,
            steps: Vec::new(),
            results: Vec::new(),
            started_at: None,
            completed_at: None,
            error: None,
            context,
        }
    }

    /// Log file path inside a logs directory.
    pub fn log_path(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("{}.json", self.execution_id))
    }

    /// Save the log to disk.
    pub fn save(&self, log_dir: &Path) -> CoreResult<()> {
        let path = self.log_path(log_dir);
        fs::create_dir_all(log_dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        fs::write(&path, json)?;
        debug!("Saved execution log to {:?}", path);
        Ok(())
    }

    /// Load a log from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        let log: Self = serde_json::from_str(&content)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(log)
    }

    /// How many times a station ran in this execution.
    pub fn runs_of(&self, node: Node) -> usize {
        self.steps.iter().filter(|s| s.as_str() == node.as_str()).count()
    }
}

/// Progress notifications published while a run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Started {
        execution_id: Uuid,
        prompt: String,
    },
    StepCompleted {
        step: String,
        index: usize,
        message: Option<String>,
    },
    Completed {
        generated_code_dir: Option<PathBuf>,
        build_result_dir: Option<PathBuf>,
    },
    Failed {
        error: String,
    },
}

/// Runs the fixed pipeline over a registry of stations.
pub struct WorkflowExecutor {
    registry: Arc<StationRegistry>,
    max_quality_retries: u32,
    log_dir: Option<PathBuf>,
}

impl WorkflowExecutor {
    /// Create a new executor with the given registry.
    pub fn new(registry: Arc<StationRegistry>) -> Self {
        Self {
            registry,
            max_quality_retries: MAX_QUALITY_RETRIES,
            log_dir: None,
        }
    }

    pub fn with_max_quality_retries(mut self, max: u32) -> Self {
        self.max_quality_retries = max;
        self
    }

    /// Persist the execution log into this directory after every station.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Execute the pipeline to completion.
    pub async fn execute(&self, context: WorkflowContext) -> CoreResult<ExecutionLog> {
        self.execute_with_events(context, None).await
    }

    /// Execute the pipeline, publishing progress into `events`.
    ///
    /// A dropped receiver does not stop the run.
    pub async fn execute_with_events(
        &self,
        context: WorkflowContext,
        events: Option<UnboundedSender<WorkflowEvent>>,
    ) -> CoreResult<ExecutionLog> {
        let emit = |event: WorkflowEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };

        let mut log = ExecutionLog::new(context);
        log.state = ExecutionState::Running;
        log.started_at = Some(Utc::now());

        info!(
            "Starting generation workflow {} for app {}",
            log.execution_id, log.context.request.app_id
        );
        emit(WorkflowEvent::Started {
            execution_id: log.execution_id,
            prompt: log.context.original_prompt.clone(),
        });

        let mut node = Node::start();
        loop {
            let station = match self.registry.get(node.as_str()) {
                Some(s) => s,
                None => {
                    let err = CoreError::StationNotFound(node.as_str().to_string());
                    self.abort(&mut log, err.to_string())?;
                    emit(WorkflowEvent::Failed { error: err.to_string() });
                    return Err(err);
                }
            };

            log.context.current_step = Some(node.as_str().to_string());
            log.steps.push(node.as_str().to_string());
            let index = log.steps.len();
            info!("Executing station [{}]: {}", index, node);

            let started = Utc::now();
            let result = match station.execute(&mut log.context).await {
                Ok(result) => result.started(started),
                Err(e) => {
                    error!("Station '{}' execution error: {}", node, e);
                    log.results.push(ExecutionLogEntry {
                        station: node.as_str().to_string(),
                        result: StationResult::failure(node.as_str(), e.to_string()).started(started),
                    });
                    self.abort(&mut log, format!("Station '{}' execution error: {}", node, e))?;
                    emit(WorkflowEvent::Failed { error: e.to_string() });
                    return Err(CoreError::StationExecutionFailed {
                        station: node.as_str().to_string(),
                        message: e.to_string(),
                    });
                }
            };

            let success = result.success;
            let message = result.message.clone();
            log.results.push(ExecutionLogEntry {
                station: node.as_str().to_string(),
                result,
            });
            self.persist(&log)?;

            if !success {
                let err_msg = message.unwrap_or_else(|| "Station failed".to_string());
                error!("Station '{}' failed: {}", node, err_msg);
                self.abort(&mut log, err_msg.clone())?;
                emit(WorkflowEvent::Failed { error: err_msg.clone() });
                return Err(CoreError::StationExecutionFailed {
                    station: node.as_str().to_string(),
                    message: err_msg,
                });
            }

            emit(WorkflowEvent::StepCompleted {
                step: node.as_str().to_string(),
                index,
                message,
            });

            let edge = (node == Node::QualityCheck)
                .then(|| route_after_quality_check(&log.context, self.max_quality_retries));
            if edge == Some(QualityEdge::Retry) {
                log.context.quality_check_count += 1;
                if let Some(result) = log.context.quality_result.take() {
                    log.context.record_quality_feedback(&result);
                }
                info!(
                    "Quality retry {}/{}",
                    log.context.quality_check_count, self.max_quality_retries
                );
            }

            match next_transition(node, edge) {
                Transition::Next(next) => node = next,
                Transition::End => break,
            }
        }

        log.state = ExecutionState::Completed;
        log.completed_at = Some(Utc::now());
        self.persist(&log)?;

        info!("Generation workflow {} completed", log.execution_id);
        emit(WorkflowEvent::Completed {
            generated_code_dir: log.context.generated_code_dir.clone(),
            build_result_dir: log.context.build_result_dir.clone(),
        });
        Ok(log)
    }

    fn abort(&self, log: &mut ExecutionLog, message: String) -> CoreResult<()> {
        log.state = ExecutionState::Failed;
        log.error = Some(message);
        log.completed_at = Some(Utc::now());
        self.persist(log)
    }

    fn persist(&self, log: &ExecutionLog) -> CoreResult<()> {
        match &self.log_dir {
            Some(dir) => log.save(dir),
            None => Ok(()),
        }
    }

    /// Load an execution log by id from the configured log directory.
    pub fn load_log(&self, execution_id: Uuid) -> CoreResult<Option<ExecutionLog>> {
        let Some(dir) = &self.log_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{}.json", execution_id));
        if path.exists() {
            Ok(Some(ExecutionLog::load(&path)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::Station;
    use crate::types::{GenerationType, QualityResult, RequestContext};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct PassStation {
        node: Node,
    }

    #[async_trait]
    impl Station for PassStation {
        fn name(&self) -> &str {
            self.node.as_str()
        }

        fn description(&self) -> &str {
            "A station that always succeeds"
        }

        async fn execute(&self, _context: &mut WorkflowContext) -> CoreResult<StationResult> {
            Ok(StationResult::success(self.node.as_str()))
        }
    }

    /// Reports the scripted verdicts in order, then valid forever.
    struct ScriptedGate {
        verdicts: Vec<bool>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Station for ScriptedGate {
        fn name(&self) -> &str {
            "quality_check"
        }

        fn description(&self) -> &str {
            "Scripted quality gate"
        }

        async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let valid = self.verdicts.get(n).copied().unwrap_or(true);
            context.quality_result = Some(if valid {
                QualityResult::valid()
            } else {
                QualityResult::invalid(vec![format!("attempt {} broken", n + 1)])
            });
            Ok(StationResult::success("quality_check"))
        }
    }

    struct FailingStation;

    #[async_trait]
    impl Station for FailingStation {
        fn name(&self) -> &str {
            "routing"
        }

        fn description(&self) -> &str {
            "A station that always fails"
        }

        async fn execute(&self, _context: &mut WorkflowContext) -> CoreResult<StationResult> {
            Ok(StationResult::failure("routing", "Intentional failure"))
        }
    }

    fn registry_with_gate(gate: ScriptedGate) -> Arc<StationRegistry> {
        let mut registry = StationRegistry::new();
        for node in Node::all() {
            if node != Node::QualityCheck {
                registry.register(Arc::new(PassStation { node }));
            }
        }
        registry.register(Arc::new(gate));
        Arc::new(registry)
    }

    fn context(generation_type: GenerationType) -> WorkflowContext {
        WorkflowContext::new(RequestContext::new(1, 99), "a todo list").with_generation_type(generation_type)
    }

    #[tokio::test]
    async fn test_single_file_skips_build() {
        let executor = WorkflowExecutor::new(registry_with_gate(ScriptedGate {
            verdicts: vec![true],
            calls: AtomicUsize::new(0),
        }));

        let log = executor.execute(context(GenerationType::SingleFile)).await.unwrap();

        assert_eq!(log.state, ExecutionState::Completed);
        assert_eq!(
            log.steps,
            vec!["image_collection", "prompt_enhancement", "routing", "code_generation", "quality_check"]
        );
        assert_eq!(log.runs_of(Node::ProjectBuild), 0);
    }

    #[tokio::test]
    async fn test_retry_then_build() {
        let executor = WorkflowExecutor::new(registry_with_gate(ScriptedGate {
            verdicts: vec![false, false, true],
            calls: AtomicUsize::new(0),
        }));

        let log = executor.execute(context(GenerationType::MultiStepProject)).await.unwrap();

        assert_eq!(log.runs_of(Node::CodeGeneration), 3);
        assert_eq!(log.runs_of(Node::ProjectBuild), 1);
        assert_eq!(log.steps.last().map(String::as_str), Some("project_build"));
        assert_eq!(log.context.quality_check_count, 2);
        assert_eq!(
            log.context.quality_feedback,
            vec!["attempt 1 broken".to_string(), "attempt 2 broken".to_string()]
        );
    }

    #[tokio::test]
    async fn test_always_invalid_is_bounded() {
        let executor = WorkflowExecutor::new(registry_with_gate(ScriptedGate {
            verdicts: vec![false; 100],
            calls: AtomicUsize::new(0),
        }));

        let log = executor.execute(context(GenerationType::MultiFile)).await.unwrap();

        assert_eq!(log.state, ExecutionState::Completed);
        assert_eq!(log.context.quality_check_count, MAX_QUALITY_RETRIES);
        assert_eq!(log.runs_of(Node::QualityCheck), MAX_QUALITY_RETRIES as usize + 1);
        assert_eq!(log.runs_of(Node::ProjectBuild), 0);
    }

    #[tokio::test]
    async fn test_failure_is_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = StationRegistry::new();
        for node in [Node::ImageCollection, Node::PromptEnhancement] {
            registry.register(Arc::new(PassStation { node }));
        }
        registry.register(Arc::new(FailingStation));
        let executor = WorkflowExecutor::new(Arc::new(registry)).with_log_dir(temp_dir.path());

        let ctx = context(GenerationType::SingleFile);
        let id = ctx.execution_id;
        let result = executor.execute(ctx).await;
        assert!(matches!(result, Err(CoreError::StationExecutionFailed { ref station, .. }) if station == "routing"));

        let log = executor.load_log(id).unwrap().unwrap();
        assert_eq!(log.state, ExecutionState::Failed);
        assert_eq!(log.error.as_deref(), Some("Intentional failure"));
        assert_eq!(log.steps.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_station_fails() {
        let executor = WorkflowExecutor::new(Arc::new(StationRegistry::new()));
        let err = executor.execute(context(GenerationType::SingleFile)).await.unwrap_err();
        assert!(matches!(err, CoreError::StationNotFound(ref s) if s == "image_collection"));
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let executor = WorkflowExecutor::new(registry_with_gate(ScriptedGate {
            verdicts: vec![true],
            calls: AtomicUsize::new(0),
        }));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        executor
            .execute_with_events(context(GenerationType::SingleFile), Some(tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(WorkflowEvent::Started { .. })));
        assert!(matches!(events.last(), Some(WorkflowEvent::Completed { .. })));
        let steps: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::StepCompleted { step, .. } => Some(step.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[4], "quality_check");
    }
}
