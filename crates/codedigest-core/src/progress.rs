//! Progress notifications for long-running phases.

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::broadcast;

/// Default channel capacity for progress events.
pub const PROGRESS_CHANNEL_SIZE: usize = 100;

/// Pipeline phase reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Operation {
    Scan,
    Extract,
    Assemble,
}

/// Position of an event within its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ProgressMode {
    Start,
    Progress,
    End,
}

/// A progress notification: `{op, mode, message?, percent?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub op: Operation,
    pub mode: ProgressMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
}

impl ProgressEvent {
    /// Create an event without message or percentage.
    pub fn new(op: Operation, mode: ProgressMode) -> Self {
        Self {
            op,
            mode,
            message: None,
            percent: None,
        }
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach a completion percentage, clamped to `0..=100`.
    pub fn with_percent(mut self, percent: f32) -> Self {
        self.percent = Some(percent.clamp(0.0, 100.0));
        self
    }
}

/// Broadcasts progress events to any number of subscribers.
///
/// Sending never blocks and never fails the pipeline: events sent while
/// nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    /// Create a reporter with its own channel.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        Self { tx }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Send an arbitrary event.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    /// Announce the start of a phase.
    pub fn start(&self, op: Operation, message: impl Into<String>) {
        self.emit(ProgressEvent::new(op, ProgressMode::Start).with_message(message));
    }

    /// Report intermediate progress.
    pub fn progress(&self, op: Operation, message: impl Into<String>, percent: Option<f32>) {
        let mut event = ProgressEvent::new(op, ProgressMode::Progress).with_message(message);
        if let Some(p) = percent {
            event = event.with_percent(p);
        }
        self.emit(event);
    }

    /// Announce the end of a phase.
    pub fn end(&self, op: Operation, message: impl Into<String>) {
        self.emit(
            ProgressEvent::new(op, ProgressMode::End)
                .with_message(message)
                .with_percent(100.0),
        );
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
