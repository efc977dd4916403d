//! # kiln_chat - Conversational code generation for kiln
//!
//! This crate sits between a chat front end and the model:
//! - **Generator sessions**: one isolated conversation per app and generation type,
//!   cached with capacity and time limits and rebuilt from history on demand
//! - **Dispatch**: structured, streaming-text or tool-augmented generation per type
//! - **Reassembly**: display stream plus display and replay transcripts
//! - **History**: append-only display and replay stores
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ ChatService │────▶│  Dispatcher  │────▶│ GeneratorCache │
//! └──────┬──────┘     └──────┬───────┘     └───────┬────────┘
//!        │                   │ model stream        │ rehydrate
//!        ▼                   ▼                     ▼
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │  Workflow   │     │  Reassembler │────▶│ HistoryStores  │
//! └─────────────┘     └──────────────┘     └────────────────┘
//! ```

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod history;
pub mod memory;
pub mod reassembly;
pub mod service;
pub mod types;

pub use cache::GeneratorCache;
pub use dispatcher::{DispatchedStream, GenerationDispatcher};
pub use error::{ChatError, ChatResult};
pub use handle::{GeneratorFactory, GeneratorHandle, HistoryGeneratorFactory, ModelBinding, ModelSuite};
pub use history::{ChatHistory, HistoryStores, InMemoryChatHistory, JsonlChatHistory};
pub use memory::ConversationMemory;
pub use reassembly::{DisplayStream, ReplayRecord, StreamReassembler, Transcript, TranscriptAccumulator};
pub use service::{render_workflow_event, ChatService, DispatchingCodeGenerator};
pub use types::{Actor, EntryKind, HistoryEntry, ToolRequestRecord, ToolResultRecord};
