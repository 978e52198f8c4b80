use super::{ComponentState, KnocklyOrchestrator, ShutdownReason};
use crate::error::{KnocklyError, Result};
use crate::events::KnocklyEvent;
use crate::hardware::HardwareLink;
use crate::live::{FrameAnnotator, LiveDependencies, LiveRecognitionLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl KnocklyOrchestrator {
    /// Run live recognition on the calling task until a shutdown signal
    /// arrives or the loop itself ends, then shut everything down.
    pub async fn run(&mut self) -> Result<i32> {
        let link = self
            .link
            .clone()
            .ok_or_else(|| KnocklyError::system("Orchestrator was not started"))?;

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| KnocklyError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| KnocklyError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let live = self.build_live_loop(link).await;
        let live_cancel = self.cancellation_token.child_token();
        let live_run = live.run(live_cancel.clone());
        tokio::pin!(live_run);

        self.set_component_state("live", ComponentState::Running)
            .await;
        info!("knockly is running");

        let requested = tokio::select! {
            _ = &mut live_run => None,
            received = shutdown_receiver => Some(received.unwrap_or_else(|_| {
                ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
            })),
        };

        let reason = match requested {
            Some(reason) => {
                live_cancel.cancel();
                if timeout(Duration::from_secs(5), &mut live_run).await.is_err() {
                    warn!("Live recognition did not stop in time");
                }
                self.set_component_state("live", ComponentState::Stopped)
                    .await;
                reason
            }
            None => {
                self.set_component_state("live", ComponentState::Failed)
                    .await;
                ShutdownReason::Error("Live recognition loop exited".to_string())
            }
        };

        info!("Shutdown initiated: {:?}", reason);

        let exit_code = self.shutdown().await?;

        info!("knockly shutdown complete");
        Ok(exit_code)
    }

    /// Snapshot the known faces and wire the live loop to the shared
    /// gateway and link. The snapshot is not refreshed while running.
    pub(super) async fn build_live_loop(&self, link: Arc<HardwareLink>) -> LiveRecognitionLoop {
        let doorbell_id = self.config.device.doorbell_id;
        let known = LiveRecognitionLoop::load_known_faces(self.store.as_ref(), doorbell_id).await;

        let deps = LiveDependencies {
            source: Arc::clone(&self.camera),
            gateway: self.gateway.clone(),
            comparator: Arc::clone(&self.comparator),
            link,
            notifier: Arc::clone(&self.notifier),
            event_bus: Arc::clone(&self.event_bus),
        };

        let live = LiveRecognitionLoop::new(deps, known, &self.config.recognition, doorbell_id);

        if self.config.display.enabled {
            live.with_annotator(FrameAnnotator::new(&self.config.display))
        } else {
            live
        }
    }

    /// SIGTERM, Ctrl+C and a `ShutdownRequested` event all resolve the
    /// same one-shot channel; whichever comes first wins.
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender: SharedSender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };

                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_reason(&sender, ShutdownReason::Signal("SIGTERM".to_string())).await;
                }
            });
        }

        let sender = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_reason(&sender, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });

        let mut receiver = self.event_bus.subscribe();
        let cancel = self.cancellation_token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => event,
                };

                match event {
                    Ok(KnocklyEvent::ShutdownRequested { .. }) => {
                        send_reason(&shutdown_sender, ShutdownReason::UserRequest).await;
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("Shutdown watcher skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

async fn send_reason(sender: &SharedSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
