//! Progress notifications.
//!
//! Stages report what they are doing through a [`ProgressHandle`]. Delivery
//! is fire-and-forget: a sink never blocks the caller and never reports
//! failure back, and updates from concurrent analysts arrive in no
//! particular order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    QueryGenerationStarted,
    QueryGenerating,
    QueryGenerated,
    /// Every query of one category is known; searching starts next.
    QueriesGenerated,
    QuerySearched,
    QueryError,
    CategoryComplete,
    CategoryFailed,
    Compiling,
    ReportChunk,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: String,
    pub status: ProgressStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Receives progress updates.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, update: ProgressUpdate);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _update: ProgressUpdate) {}
}

/// Fans updates out to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest updates; with no subscribers
/// updates are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressUpdate>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }
}

impl ProgressSink for BroadcastProgress {
    fn emit(&self, update: ProgressUpdate) {
        let _ = self.sender.send(update);
    }
}

/// A sink bound to one job id.
#[derive(Clone)]
pub struct ProgressHandle {
    job_id: String,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressHandle {
    pub fn new(job_id: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            job_id: job_id.into(),
            sink,
        }
    }

    pub fn noop(job_id: impl Into<String>) -> Self {
        Self::new(job_id, Arc::new(NoopProgress))
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn emit(&self, status: ProgressStatus, message: impl Into<String>) {
        self.send(status, message.into(), None, None);
    }

    pub fn emit_result(&self, status: ProgressStatus, message: impl Into<String>, result: Value) {
        self.send(status, message.into(), Some(result), None);
    }

    pub fn emit_error(&self, status: ProgressStatus, message: impl Into<String>, error: impl Into<String>) {
        self.send(status, message.into(), None, Some(error.into()));
    }

    fn send(&self, status: ProgressStatus, message: String, result: Option<Value>, error: Option<String>) {
        self.sink.emit(ProgressUpdate {
            job_id: self.job_id.clone(),
            status,
            message,
            result,
            error,
            timestamp: Utc::now(),
        });
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}
