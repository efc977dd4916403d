//! Generator handles and the factory that builds them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use kiln_codegen::{ModelMessage, StreamingModel, StructuredModel, ToolSet, ToolStreamingModel};
use kiln_core::config::MemoryConfig;
use kiln_core::{GenerationType, SessionKey};

use crate::error::ChatResult;
use crate::history::HistoryStores;
use crate::memory::ConversationMemory;

/// The model capabilities available to generators.
#[derive(Clone)]
pub struct ModelSuite {
    pub structured: Arc<dyn StructuredModel>,
    pub streaming: Arc<dyn StreamingModel>,
    pub tool_streaming: Arc<dyn ToolStreamingModel>,
}

impl ModelSuite {
    /// Use one model for all three capabilities.
    pub fn shared<M>(model: Arc<M>) -> Self
    where
        M: StructuredModel + StreamingModel + ToolStreamingModel + 'static,
    {
        Self {
            structured: model.clone(),
            streaming: model.clone(),
            tool_streaming: model,
        }
    }
}

/// Capability bound to a handle, fixed by its generation type.
#[derive(Clone)]
pub enum ModelBinding {
    Text {
        structured: Arc<dyn StructuredModel>,
        streaming: Arc<dyn StreamingModel>,
    },
    Project {
        model: Arc<dyn ToolStreamingModel>,
        tools: Arc<ToolSet>,
    },
}

/// One isolated conversation: memory plus the bound model capability.
pub struct GeneratorHandle {
    key: SessionKey,
    memory: Mutex<ConversationMemory>,
    binding: ModelBinding,
    created_at: DateTime<Utc>,
}

impl GeneratorHandle {
    pub fn new(key: SessionKey, memory: ConversationMemory, binding: ModelBinding) -> Self {
        Self {
            key,
            memory: Mutex::new(memory),
            binding,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Memory contents followed by `user_message`.
    pub async fn conversation_with(&self, user_message: &str) -> Vec<ModelMessage> {
        let mut messages = self.memory.lock().await.messages();
        messages.push(ModelMessage::user(user_message));
        messages
    }

    /// Record a finished exchange.
    pub async fn remember(&self, messages: impl IntoIterator<Item = ModelMessage>) {
        self.memory.lock().await.extend(messages);
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }
}

impl std::fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorHandle")
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Builds a handle for a session key. Called at most once per cache load.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeneratorFactory: Send + Sync {
    async fn create(&self, key: SessionKey) -> ChatResult<GeneratorHandle>;
}

/// Factory that rehydrates memory from chat history.
///
/// Text generators reload from the display store; project generators reload
/// from the replay store so tool turns come back intact.
pub struct HistoryGeneratorFactory {
    models: ModelSuite,
    history: HistoryStores,
    memory: MemoryConfig,
    output_dir: PathBuf,
}

impl HistoryGeneratorFactory {
    pub fn new(models: ModelSuite, history: HistoryStores, memory: MemoryConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            models,
            history,
            memory,
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl GeneratorFactory for HistoryGeneratorFactory {
    async fn create(&self, key: SessionKey) -> ChatResult<GeneratorHandle> {
        let (store, turns) = match key.generation_type {
            GenerationType::MultiStepProject => (&self.history.replay, self.memory.project_history_turns),
            _ => (&self.history.display, self.memory.text_history_turns),
        };

        let entries = store.load_recent(key.app_id, turns).await?;
        let memory = ConversationMemory::rehydrate(self.memory.max_messages, &entries);
        info!(
            "Created generator {} with {} remembered messages ({} history entries)",
            key,
            memory.len(),
            entries.len()
        );

        let binding = match key.generation_type {
            GenerationType::MultiStepProject => ModelBinding::Project {
                model: self.models.tool_streaming.clone(),
                tools: Arc::new(ToolSet::for_project(&self.output_dir, key.app_id)),
            },
            _ => ModelBinding::Text {
                structured: self.models.structured.clone(),
                streaming: self.models.streaming.clone(),
            },
        };

        Ok(GeneratorHandle::new(key, memory, binding))
    }
}
