//! Service wiring shared by the commands.

use std::sync::Arc;

use anyhow::{Context, Result};

use kiln_chat::{
    ChatService, DispatchingCodeGenerator, GenerationDispatcher, GeneratorCache,
    HistoryGeneratorFactory, HistoryStores, ModelSuite,
};
use kiln_codegen::{CodeFileSaver, OpenAiModel};
use kiln_core::{create_pipeline_registry, KilnConfig, PipelineServices, WorkflowExecutor};
use kiln_policy::CodeQualityChecker;
use kiln_runner::{BuildStatusHub, FanoutSink, LoggingStatusSink, NpmProjectBuilder};

use super::GlobalArgs;

pub fn load_config(global: &GlobalArgs) -> Result<KilnConfig> {
    let workspace = global
        .workspace
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", global.workspace.display()))?;
    KilnConfig::load(&workspace).context("Failed to load settings")
}

/// Everything a generation command needs.
pub struct Kiln {
    pub config: KilnConfig,
    pub service: ChatService,
    pub workflow: Arc<WorkflowExecutor>,
    pub status: BuildStatusHub,
}

impl Kiln {
    /// Wire the services against the configured model provider.
    pub fn connect(config: KilnConfig, stream_mode: bool) -> Result<Self> {
        let model = OpenAiModel::from_config(&config.llm, config.generation.max_tool_invocations)
            .context("Model provider is not configured")?;
        Ok(Self::assemble(config, ModelSuite::shared(Arc::new(model)), stream_mode))
    }

    pub fn assemble(config: KilnConfig, models: ModelSuite, stream_mode: bool) -> Self {
        let history = HistoryStores::jsonl(config.history_dir());
        let factory = HistoryGeneratorFactory::new(
            models,
            history.clone(),
            config.memory.clone(),
            &config.output_dir,
        );
        let cache = Arc::new(GeneratorCache::new(Arc::new(factory), &config.cache));
        let dispatcher = Arc::new(GenerationDispatcher::new(
            cache,
            CodeFileSaver::new(&config.output_dir),
        ));

        let status = BuildStatusHub::new();
        let sink = FanoutSink::new()
            .with(Arc::new(LoggingStatusSink))
            .with(Arc::new(status.clone()));
        let services = PipelineServices::new(
            Arc::new(DispatchingCodeGenerator::new(dispatcher.clone(), stream_mode)),
            Arc::new(CodeQualityChecker::new()),
            Arc::new(NpmProjectBuilder::new(&config.build, Arc::new(sink))),
        );
        let workflow = Arc::new(
            WorkflowExecutor::new(Arc::new(create_pipeline_registry(services)))
                .with_max_quality_retries(config.workflow.max_quality_retries)
                .with_log_dir(config.logs_dir()),
        );

        let service = ChatService::new(dispatcher, history)
            .with_workflow(workflow.clone())
            .with_stream_mode(stream_mode);

        Self {
            config,
            service,
            workflow,
            status,
        }
    }
}
