use crate::hardware::HardwareCommand;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the knockly daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KnocklyEvent {
    /// An enrolled, allowed face was recognized and the latch was signalled
    FaceRecognized { label: String, timestamp: SystemTime },
    /// An enrolled face marked as blocked was seen at the door
    FaceBlocked { label: String, timestamp: SystemTime },
    /// Only unknown faces were seen; a visitor notification was dispatched
    VisitorDetected { faces: usize, timestamp: SystemTime },
    /// The microcontroller reported a doorbell press
    DoorbellRung { timestamp: SystemTime },
    /// A command byte was written to the microcontroller
    CommandSent { command: HardwareCommand },
    /// A telemetry line arrived from the microcontroller
    TelemetryReceived { line: String },
    /// A video was converted into encodings and archived
    EnrollmentCompleted { asset: String, stored: usize },
    /// A video failed validation and was left in place
    EnrollmentRejected { asset: String, reason: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested { timestamp: SystemTime, reason: String },
}

impl KnocklyEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            KnocklyEvent::FaceRecognized { label, .. } => format!("Known face detected: {}", label),
            KnocklyEvent::FaceBlocked { label, .. } => format!("Blocked face detected: {}", label),
            KnocklyEvent::VisitorDetected { faces, .. } => {
                format!("Possible visitor ({} unknown face(s))", faces)
            }
            KnocklyEvent::DoorbellRung { .. } => "Doorbell rung".to_string(),
            KnocklyEvent::CommandSent { command } => {
                format!("Command sent: {}", command.description())
            }
            KnocklyEvent::TelemetryReceived { line } => format!("Microcontroller: {}", line),
            KnocklyEvent::EnrollmentCompleted { asset, stored } => {
                format!("Enrollment of {} stored {} encodings", asset, stored)
            }
            KnocklyEvent::EnrollmentRejected { asset, reason } => {
                format!("Enrollment of {} rejected: {}", asset, reason)
            }
            KnocklyEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            KnocklyEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            KnocklyEvent::FaceRecognized { .. } => "face_recognized",
            KnocklyEvent::FaceBlocked { .. } => "face_blocked",
            KnocklyEvent::VisitorDetected { .. } => "visitor_detected",
            KnocklyEvent::DoorbellRung { .. } => "doorbell_rung",
            KnocklyEvent::CommandSent { .. } => "command_sent",
            KnocklyEvent::TelemetryReceived { .. } => "telemetry_received",
            KnocklyEvent::EnrollmentCompleted { .. } => "enrollment_completed",
            KnocklyEvent::EnrollmentRejected { .. } => "enrollment_rejected",
            KnocklyEvent::SystemError { .. } => "system_error",
            KnocklyEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<KnocklyEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<KnocklyEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: KnocklyEvent) -> usize {
        match &event {
            KnocklyEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            KnocklyEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Event: {}", event.description()),
        }

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("Event dropped, no subscribers");
                0
            }
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Drain a receiver, logging events until the bus closes
pub async fn log_events(mut receiver: broadcast::Receiver<KnocklyEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => match event {
                KnocklyEvent::SystemError { .. } | KnocklyEvent::ShutdownRequested { .. } => {}
                KnocklyEvent::EnrollmentRejected { .. } => warn!("{}", event.description()),
                _ => info!("{}", event.description()),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Event logger lagged behind by {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Event bus closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let delivered = event_bus.publish(KnocklyEvent::DoorbellRung {
            timestamp: SystemTime::now(),
        });
        assert_eq!(delivered, 1);

        let received = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "doorbell_rung");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(10);
        assert_eq!(event_bus.subscriber_count(), 0);

        let delivered = event_bus.publish(KnocklyEvent::CommandSent {
            command: HardwareCommand::RequestOpen,
        });
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_event_descriptions() {
        let event = KnocklyEvent::EnrollmentCompleted {
            asset: "alice.mp4".to_string(),
            stored: 5,
        };
        assert_eq!(event.description(), "Enrollment of alice.mp4 stored 5 encodings");

        let event = KnocklyEvent::CommandSent {
            command: HardwareCommand::FaceAllowed,
        };
        assert_eq!(event.description(), "Command sent: Known face detected.");
    }
}
