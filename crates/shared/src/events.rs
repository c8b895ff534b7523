//! Events delivered to the consumer of a streaming response.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Channel form of the consumer callbacks, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Full assistant text so far (not the delta).
    Fragment(String),
    /// Stream ended normally.
    Completed,
    /// Stopped by a cancellation request. Fragments already sent stand.
    Cancelled,
    /// Stream failed. Terminal.
    Error { kind: ErrorKind, message: String },
    /// A single event was dropped; streaming continues.
    Diagnostic(String),
}

impl StreamEvent {
    /// True for the last event a stream produces.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Completed | StreamEvent::Cancelled | StreamEvent::Error { .. }
        )
    }
}
