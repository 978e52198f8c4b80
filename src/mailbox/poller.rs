use super::Mailbox;
use crate::hardware::{HardwareCommand, HardwareLink};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// What one poll tick serviced
#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
    pub command: Option<HardwareCommand>,
    pub telemetry: Option<String>,
}

/// Services the mailbox and the microcontroller's telemetry on every tick
pub struct CommandPoller {
    mailbox: Arc<dyn Mailbox>,
    link: Arc<HardwareLink>,
    interval: Duration,
}

impl CommandPoller {
    pub fn new(mailbox: Arc<dyn Mailbox>, link: Arc<HardwareLink>, interval: Duration) -> Self {
        Self {
            mailbox,
            link,
            interval,
        }
    }

    /// Forward a pending command (if any), then read one telemetry line
    pub async fn tick(&self) -> TickReport {
        let command = self.mailbox.check().await;
        if let Some(command) = command {
            // Failures are logged by the link
            let _ = self.link.send(command).await;
        }

        let telemetry = self.link.poll_telemetry().await;

        TickReport { command, telemetry }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!("Listening for commands and microcontroller messages");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Command poller stopped");
    }
}
