use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Boundary events retained per execution; oldest dropped first.
pub const HISTORY_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Starting,
    Processing,
    Completing,
    Complete,
    Error,
}

/// One observation from an execution's progress stream. Append-only per
/// execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: ProgressPhase, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Boundary events are the only ones worth retaining.
    pub fn is_boundary(&self) -> bool {
        matches!(self.phase, ProgressPhase::Complete | ProgressPhase::Error)
            || self.percent == 0
            || self.percent == 100
    }

    fn cancelled() -> Self {
        Self::new(ProgressPhase::Error, 100, "cancelled")
    }
}

/// Observes the progress stream of an in-flight execution: one "current"
/// event plus a bounded history of boundary events.
#[derive(Default)]
pub struct ProgressTracker {
    current: Option<ProgressEvent>,
    history: VecDeque<ProgressEvent>,
    on_cancel: Option<Box<dyn Fn() + Send>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: ProgressEvent) {
        if event.is_boundary() {
            if self.history.len() >= HISTORY_CAP {
                self.history.pop_front();
            }
            self.history.push_back(event.clone());
        }
        self.current = Some(event);
    }

    /// Registers the callback `cancel` fires. Last registration wins.
    pub fn set_cancel_hook(&mut self, hook: impl Fn() + Send + 'static) {
        self.on_cancel = Some(Box::new(hook));
    }

    /// Fires the registered hook and forces "current" into a cancelled
    /// error state. History is left untouched.
    pub fn cancel(&mut self) {
        if let Some(hook) = &self.on_cancel {
            hook();
        }
        self.current = Some(ProgressEvent::cancelled());
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn current(&self) -> Option<&ProgressEvent> {
        self.current.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &ProgressEvent> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("current", &self.current)
            .field("history", &self.history)
            .field("has_cancel_hook", &self.on_cancel.is_some())
            .finish()
    }
}
