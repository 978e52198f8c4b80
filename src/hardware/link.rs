use super::command::HardwareCommand;
use super::transport::{ClosedTransport, SerialConnector, SerialTransport};
use crate::error::LinkError;
use crate::events::{EventBus, KnocklyEvent};
use crate::notify::{spawn_notification, NotificationKind, Notifier};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Telemetry line the microcontroller prints when the button is pressed
pub const DOORBELL_SENTINEL: &str = "Doorbell rung.";

/// Sole owner of the microcontroller serial handle.
///
/// Every writer (live recognition, mailbox) and the telemetry reader go
/// through the same mutex, so bytes from different tasks never interleave
/// and the settle delay after a command is honoured before the next use.
pub struct HardwareLink {
    transport: Arc<Mutex<Box<dyn SerialTransport>>>,
    connector: Arc<dyn SerialConnector>,
    settle: Duration,
    event_bus: Arc<EventBus>,
    notifier: Arc<dyn Notifier>,
    doorbell_id: u32,
}

impl HardwareLink {
    /// Discover and open the microcontroller port.
    ///
    /// Fails with `DeviceNotFound` when no port matches; callers treat that
    /// as fatal.
    pub async fn connect(
        connector: Arc<dyn SerialConnector>,
        settle: Duration,
        event_bus: Arc<EventBus>,
        notifier: Arc<dyn Notifier>,
        doorbell_id: u32,
    ) -> Result<Self, LinkError> {
        let transport = Self::open(Arc::clone(&connector)).await?;

        Ok(Self {
            transport: Arc::new(Mutex::new(transport)),
            connector,
            settle,
            event_bus,
            notifier,
            doorbell_id,
        })
    }

    async fn open(connector: Arc<dyn SerialConnector>) -> Result<Box<dyn SerialTransport>, LinkError> {
        tokio::task::spawn_blocking(move || connector.connect())
            .await
            .map_err(|e| LinkError::Worker {
                details: e.to_string(),
            })?
    }

    /// Close the current handle, rediscover the port and open it again.
    ///
    /// The device stays locked while a handle is open, so the old one is
    /// dropped first. If the reopen fails the link is left closed and every
    /// later read or write reports `NotConnected`.
    pub async fn reconnect(&self) -> Result<(), LinkError> {
        let mut guard = self.transport.lock().await;
        let previous = guard.port_name().to_string();
        *guard = Box::new(ClosedTransport::new(previous.clone()));

        let fresh = Self::open(Arc::clone(&self.connector)).await?;
        info!(
            "Microcontroller link re-established on {} (was {})",
            fresh.port_name(),
            previous
        );
        *guard = fresh;
        Ok(())
    }

    /// Write one command byte. I/O failures are logged and returned, never retried.
    pub async fn send(&self, command: HardwareCommand) -> Result<(), LinkError> {
        let guard = Arc::clone(&self.transport).lock_owned().await;
        let byte = command.wire_byte();

        let (guard, result) = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let result = guard.write_byte(byte);
            (guard, result)
        })
        .await
        .map_err(|e| LinkError::Worker {
            details: e.to_string(),
        })?;

        let result = result.map_err(|source| LinkError::HardwareIo {
            operation: "write",
            source,
        });

        match &result {
            Ok(()) => {
                info!("{}", command.description());
                self.event_bus.publish(KnocklyEvent::CommandSent { command });
            }
            Err(e) => error!("Sending command {}: {}", command, e),
        }

        // Hold the handle through the settle time so the next user waits too
        tokio::time::sleep(self.settle).await;
        drop(guard);

        result
    }

    /// Read at most one telemetry line within the port timeout.
    ///
    /// The doorbell sentinel additionally fires a relay notification in the
    /// background. Read failures are logged and yield `None`.
    pub async fn poll_telemetry(&self) -> Option<String> {
        let guard = Arc::clone(&self.transport).lock_owned().await;

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            guard.read_line()
        })
        .await;

        let line = match result {
            Ok(Ok(Some(line))) if !line.is_empty() => line,
            Ok(Ok(_)) => return None,
            Ok(Err(source)) => {
                let err = LinkError::HardwareIo {
                    operation: "read",
                    source,
                };
                error!("Reading microcontroller: {}", err);
                return None;
            }
            Err(e) => {
                warn!("Serial read task failed: {}", e);
                return None;
            }
        };

        info!("Microcontroller: {}", line);
        self.event_bus.publish(KnocklyEvent::TelemetryReceived { line: line.clone() });

        if line == DOORBELL_SENTINEL {
            self.event_bus.publish(KnocklyEvent::DoorbellRung {
                timestamp: SystemTime::now(),
            });
            spawn_notification(
                Arc::clone(&self.notifier),
                NotificationKind::DoorbellRung,
                self.doorbell_id,
            );
        }

        Some(line)
    }

    /// Name of the currently open port
    pub async fn port_name(&self) -> String {
        self.transport.lock().await.port_name().to_string()
    }
}
