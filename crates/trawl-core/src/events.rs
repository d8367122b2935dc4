//! Typed event stream for workflow progress.
//!
//! The executor, the anti-detection manager and the batch runner publish
//! [`WorkflowEvent`]s on an [`EventBus`]; callers subscribe to observe a run
//! without threading callbacks through the engine.

use crate::config::ExecutionSettings;
use crate::types::KeyStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Progress and detection events emitted while a run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Processing of a lookup key began
    KeyStarted {
        /// Lookup key
        key: String,
    },
    /// A workflow step is about to run
    StepStarted {
        /// Lookup key
        key: String,
        /// Zero-based step position
        index: usize,
        /// Action name
        action: String,
    },
    /// A workflow step completed
    StepSucceeded {
        /// Lookup key
        key: String,
        /// Zero-based step position
        index: usize,
        /// Action name
        action: String,
    },
    /// A workflow step failed and will be attempted again
    StepRetrying {
        /// Lookup key
        key: String,
        /// Zero-based step position
        index: usize,
        /// Action name
        action: String,
        /// Retry number (1-based)
        attempt: u32,
        /// Failure that triggered the retry
        error: String,
    },
    /// A workflow step failed for good
    StepFailed {
        /// Lookup key
        key: String,
        /// Zero-based step position
        index: usize,
        /// Action name
        action: String,
        /// Failure description
        error: String,
    },
    /// The remaining steps for a key were skipped
    KeySkipped {
        /// Lookup key
        key: String,
        /// Position of the step that requested the skip
        index: usize,
        /// Flag or reason that caused the skip
        reason: String,
    },
    /// Processing of a lookup key ended
    KeyFinished {
        /// Lookup key
        key: String,
        /// Terminal status
        status: KeyStatus,
    },
    /// The browser session was released and re-acquired
    SessionRotated {
        /// Why the rotation happened
        reason: String,
        /// Requests served by the discarded session
        requests: u32,
    },
    /// A CAPTCHA indicator was found on the page
    CaptchaDetected {
        /// Selector that matched
        selector: String,
        /// Detection attempt (1-based)
        attempt: u32,
    },
    /// A blocking indicator was found on the page
    BlockingDetected {
        /// Selector or text pattern that matched
        indicator: String,
    },
    /// Local recovery failed and an external proxy rotation was requested
    ProxyRotationRequested,
}

/// Broadcast channel carrying [`WorkflowEvent`]s.
///
/// Cloning the bus yields another publisher for the same channel. Emitting
/// with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a bus sized by [`ExecutionSettings::event_buffer`].
    #[must_use]
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        Self::new(settings.event_buffer)
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: WorkflowEvent) {
        // No receivers is the common case for headless batch runs.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::from_settings(&ExecutionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(WorkflowEvent::ProxyRotationRequested);
    }

    #[test]
    fn test_configured_buffer_bounds_slow_subscribers() {
        let settings = ExecutionSettings {
            event_buffer: 2,
            ..ExecutionSettings::default()
        };
        let bus = EventBus::from_settings(&settings);
        let mut rx = bus.subscribe();
        for _ in 0..3 {
            bus.emit(WorkflowEvent::ProxyRotationRequested);
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(WorkflowEvent::KeyStarted {
            key: "A1".to_string(),
        });
        bus.emit(WorkflowEvent::KeyFinished {
            key: "A1".to_string(),
            status: KeyStatus::Succeeded,
        });

        assert_eq!(
            rx.try_recv().expect("first event"),
            WorkflowEvent::KeyStarted {
                key: "A1".to_string()
            }
        );
        assert!(matches!(
            rx.try_recv().expect("second event"),
            WorkflowEvent::KeyFinished {
                status: KeyStatus::Succeeded,
                ..
            }
        ));
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_string(&WorkflowEvent::BlockingDetected {
            indicator: "access denied".to_string(),
        })
        .expect("serialize event");
        assert!(json.contains(r#""event":"blocking_detected""#));
    }
}
