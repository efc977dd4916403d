//! Build status notifications.
//!
//! Builds report progress as [`BuildStatusEvent`]s through a
//! [`BuildStatusSink`]. The [`BuildStatusHub`] fans events out to any number
//! of subscribers, each usually interested in one application.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use kiln_core::{AppId, RequestContext};

use crate::error::RunnerResult;

const HUB_CAPACITY: usize = 256;

/// What happened to a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BuildStatus {
    BuildStarted,
    BuildSuccess,
    BuildFailure { reason: String },
}

/// A status notification keyed by application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatusEvent {
    pub app_id: AppId,
    pub user_id: i64,
    pub request_id: String,
    #[serde(flatten)]
    pub status: BuildStatus,
    pub timestamp: DateTime<Utc>,
}

impl BuildStatusEvent {
    pub fn new(ctx: &RequestContext, status: BuildStatus) -> Self {
        Self {
            app_id: ctx.app_id,
            user_id: ctx.user_id,
            request_id: ctx.request_id.clone(),
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> RunnerResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receives build status notifications. Publishing never fails the build.
#[cfg_attr(test, mockall::automock)]
pub trait BuildStatusSink: Send + Sync {
    fn publish(&self, event: BuildStatusEvent);
}

/// Sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStatusSink;

impl BuildStatusSink for LoggingStatusSink {
    fn publish(&self, event: BuildStatusEvent) {
        match &event.status {
            BuildStatus::BuildStarted => info!(app_id = event.app_id, "Build started"),
            BuildStatus::BuildSuccess => info!(app_id = event.app_id, "Build succeeded"),
            BuildStatus::BuildFailure { reason } => {
                error!(app_id = event.app_id, "Build failed: {}", reason)
            }
        }
    }
}

/// Broadcast fan-out of status events.
#[derive(Debug, Clone)]
pub struct BuildStatusHub {
    sender: broadcast::Sender<BuildStatusEvent>,
}

impl Default for BuildStatusHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildStatusHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    /// Every event.
    pub fn subscribe(&self) -> BuildStatusSubscription {
        BuildStatusSubscription {
            receiver: self.sender.subscribe(),
            app_id: None,
        }
    }

    /// Events of one application only.
    pub fn subscribe_app(&self, app_id: AppId) -> BuildStatusSubscription {
        BuildStatusSubscription {
            receiver: self.sender.subscribe(),
            app_id: Some(app_id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl BuildStatusSink for BuildStatusHub {
    fn publish(&self, event: BuildStatusEvent) {
        // No subscribers is normal for background builds.
        let _ = self.sender.send(event);
    }
}

/// A filtered view of the hub.
pub struct BuildStatusSubscription {
    receiver: broadcast::Receiver<BuildStatusEvent>,
    app_id: Option<AppId>,
}

impl BuildStatusSubscription {
    /// Next matching event, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<BuildStatusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.app_id.map_or(true, |id| id == event.app_id) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Build status subscriber lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Publishes to several sinks.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn BuildStatusSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn BuildStatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl BuildStatusSink for FanoutSink {
    fn publish(&self, event: BuildStatusEvent) {
        for sink in &self.sinks {
            sink.publish(event.clone());
        }
    }
}

/// Sink that keeps every event, for assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingStatusSink {
    events: Arc<Mutex<Vec<BuildStatusEvent>>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BuildStatusEvent> {
        self.events.lock().clone()
    }

    pub fn statuses(&self) -> Vec<BuildStatus> {
        self.events.lock().iter().map(|e| e.status.clone()).collect()
    }
}

impl BuildStatusSink for RecordingStatusSink {
    fn publish(&self, event: BuildStatusEvent) {
        self.events.lock().push(event);
    }
}
