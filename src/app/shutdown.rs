use super::{ComponentState, KnocklyOrchestrator};
use crate::error::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const CAMERA_STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl KnocklyOrchestrator {
    /// Cancel background tasks, wait for them, then release the camera.
    /// Returns 0 when everything stopped cleanly and 1 otherwise.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Stopping)
                    .await;
                match timeout(Duration::from_secs(2), keyboard_handler.stop()).await {
                    Ok(Ok(())) => {
                        self.set_component_state("keyboard", ComponentState::Stopped)
                            .await
                    }
                    _ => {
                        error!("Error stopping keyboard handler");
                        self.set_component_state("keyboard", ComponentState::Failed)
                            .await;
                        exit_code = 1;
                    }
                }
            }
        }

        // Reverse start order: upload, mailbox, enrollment
        let tasks: Vec<_> = self.tasks.drain(..).rev().collect();
        for (component, handle) in tasks {
            if !self.stop_task(component, handle).await {
                exit_code = 1;
            }
        }

        if self.camera.is_running() {
            self.set_component_state("camera", ComponentState::Stopping)
                .await;
            match timeout(CAMERA_STOP_TIMEOUT, self.camera.stop()).await {
                Ok(Ok(())) => {
                    self.set_component_state("camera", ComponentState::Stopped)
                        .await;
                    info!("camera component stopped");
                }
                Ok(Err(e)) => {
                    error!("Error stopping camera component: {}", e);
                    self.set_component_state("camera", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
                Err(_) => {
                    error!("camera component stop timeout");
                    self.set_component_state("camera", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
            }
        }

        if let Some(event_logger) = self.event_logger.take() {
            event_logger.abort();
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Wait for a cancelled task to wind down; a task that already failed
    /// or does not finish in time counts as a stop error.
    async fn stop_task(&self, component: &'static str, mut handle: JoinHandle<()>) -> bool {
        let failed_earlier = self.get_component_state(component).await == Some(ComponentState::Failed);

        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(TASK_STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) if !failed_earlier => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                true
            }
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                false
            }
            Ok(Err(e)) => {
                error!("{} component task failed: {}", component, e);
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                false
            }
            Err(_) => {
                error!("{} component stop timeout", component);
                handle.abort();
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                false
            }
        }
    }
}
