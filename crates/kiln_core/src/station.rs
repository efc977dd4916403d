//! Station definitions.
//!
//! A station is one node of the generation pipeline. The executor looks
//! stations up by name in a [`StationRegistry`](crate::registry::StationRegistry)
//! and hands each one exclusive access to the [`WorkflowContext`] while it runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use kiln_core::{CoreResult, Station, StationResult, WorkflowContext};
//!
//! struct Shout;
//!
//! #[async_trait]
//! impl Station for Shout {
//!     fn name(&self) -> &str { "prompt_enhancement" }
//!     fn description(&self) -> &str { "Upper-cases the prompt" }
//!
//!     async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult> {
//!         context.enhanced_prompt = Some(context.original_prompt.to_uppercase());
//!         Ok(StationResult::success(self.name()))
//!     }
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::WorkflowContext;
use crate::error::CoreResult;

/// Result from station execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationResult {
    pub station_id: String,
    pub success: bool,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub logs: Vec<LogEntry>,
}

impl StationResult {
    pub fn success(station_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            station_id: station_id.into(),
            success: true,
            message: None,
            started_at: now,
            completed_at: now,
            logs: Vec::new(),
        }
    }

    pub fn failure(station_id: impl Into<String>, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            station_id: station_id.into(),
            success: false,
            message: Some(message.into()),
            started_at: now,
            completed_at: now,
            logs: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    /// Stamp the start time measured by the caller.
    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self
    }
}

/// A log entry from station execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: LogLevel::Warn,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
}

/// Trait for pipeline stations.
///
/// Stations must be `Send + Sync`; one registry is shared by every concurrent
/// pipeline run, while each run owns its own context.
#[async_trait]
pub trait Station: Send + Sync {
    /// Unique station name, used for registry lookup.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Execute the station against the run's context.
    ///
    /// Returning `Err` or a failed [`StationResult`] aborts the run.
    async fn execute(&self, context: &mut WorkflowContext) -> CoreResult<StationResult>;
}
