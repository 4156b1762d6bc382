//! Transient-notification contract.
//!
//! The classifier and the undo manager publish toasts through this trait;
//! rendering them is the host's job.

use std::sync::{Mutex, PoisonError};

/// Severity of a transient notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// One user-facing transient message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Channel for transient messages.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notice: Notice);
}

/// Sink that buffers notices until the host drains them.
#[derive(Default)]
pub struct BufferedSink {
    notices: Mutex<Vec<Notice>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all buffered notices, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        let mut notices = self
            .notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *notices)
    }

    /// Copies the buffered notices without removing them.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for BufferedSink {
    fn publish(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_sink_collects_and_drains() {
        let sink = BufferedSink::new();
        sink.publish(Notice::error("boom"));
        sink.publish(Notice::warning("careful"));

        assert_eq!(sink.snapshot().len(), 2);
        let drained = sink.drain();
        assert_eq!(drained[0], Notice::error("boom"));
        assert_eq!(drained[1].severity, Severity::Warning);
        assert!(sink.snapshot().is_empty());
    }
}
