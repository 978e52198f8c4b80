use super::{ComponentState, KnocklyOrchestrator};
use crate::enrollment::EnrollmentPipeline;
use crate::error::Result;
use crate::events::log_events;
#[cfg(feature = "upload")]
use crate::events::KnocklyEvent;
use crate::hardware::{HardwareCommand, HardwareLink};
use crate::mailbox::CommandPoller;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

impl KnocklyOrchestrator {
    /// Register every component as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing knockly components");

        let mut states = self.component_states.lock().await;
        for component in ["camera", "link", "enrollment", "mailbox", "live"] {
            states.insert(component.to_string(), ComponentState::Stopped);
        }

        if self.upload_enabled() {
            states.insert("upload".to_string(), ComponentState::Stopped);
        }

        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!(
            "Doorbell {} using recognition engine '{}'",
            self.config.device.doorbell_id,
            self.gateway.engine_name()
        );
        Ok(())
    }

    /// Bring up the camera and the microcontroller link, then spawn the
    /// background tasks. The live loop itself is run by `run`.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting knockly");

        self.set_component_state("camera", ComponentState::Starting)
            .await;
        if let Err(e) = self.camera.start().await {
            error!("Failed to start camera: {}", e);
            self.set_component_state("camera", ComponentState::Failed)
                .await;
            return Err(e.into());
        }
        self.set_component_state("camera", ComponentState::Running)
            .await;

        let link = self.open_link().await?;
        self.link = Some(Arc::clone(&link));

        self.spawn_event_logger();
        self.spawn_enrollment().await;
        self.spawn_poller(link).await;
        self.spawn_upload().await;

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;
                keyboard_handler.start().await?;
                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
            }
        }

        info!("knockly started");
        Ok(())
    }

    /// Open the port, reset the microcontroller, wait for it to come back
    /// and open the port again. A missing device is fatal.
    async fn open_link(&self) -> Result<Arc<HardwareLink>> {
        self.set_component_state("link", ComponentState::Starting)
            .await;

        let link = match HardwareLink::connect(
            Arc::clone(&self.connector),
            self.config.serial.settle(),
            Arc::clone(&self.event_bus),
            Arc::clone(&self.notifier),
            self.config.device.doorbell_id,
        )
        .await
        {
            Ok(link) => link,
            Err(e) => {
                error!("Microcontroller link unavailable: {}", e);
                self.set_component_state("link", ComponentState::Failed)
                    .await;
                return Err(e.into());
            }
        };

        if let Err(e) = link.send(HardwareCommand::Reset).await {
            warn!("Startup reset was not delivered: {}", e);
        }

        tokio::time::sleep(self.config.serial.reset_settle()).await;

        if let Err(e) = link.reconnect().await {
            error!("Microcontroller did not come back after reset: {}", e);
            self.set_component_state("link", ComponentState::Failed)
                .await;
            return Err(e.into());
        }

        self.set_component_state("link", ComponentState::Running)
            .await;
        info!("Microcontroller link ready on {}", link.port_name().await);
        Ok(Arc::new(link))
    }

    fn spawn_event_logger(&mut self) {
        let receiver = self.event_bus.subscribe();
        self.event_logger = Some(tokio::spawn(log_events(receiver)));
    }

    async fn spawn_enrollment(&mut self) {
        let pipeline = EnrollmentPipeline::new(
            self.config.enrollment.clone(),
            self.config.device.doorbell_id,
            self.gateway.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.decoder),
            Arc::clone(&self.event_bus),
        );

        let cancel = self.cancellation_token.child_token();
        self.tasks
            .push(("enrollment", tokio::spawn(pipeline.run(cancel))));
        self.set_component_state("enrollment", ComponentState::Running)
            .await;
    }

    async fn spawn_poller(&mut self, link: Arc<HardwareLink>) {
        let poller = CommandPoller::new(
            Arc::clone(&self.mailbox),
            link,
            Duration::from_millis(self.config.mailbox.poll_interval_ms),
        );

        let cancel = self.cancellation_token.child_token();
        self.tasks.push(("mailbox", tokio::spawn(poller.run(cancel))));
        self.set_component_state("mailbox", ComponentState::Running)
            .await;
    }

    async fn spawn_upload(&mut self) {
        if !self.upload_enabled() {
            return;
        }

        #[cfg(feature = "upload")]
        {
            use crate::upload::UploadServer;

            let server = UploadServer::new(
                self.config.upload.clone(),
                &self.config.enrollment,
                Arc::clone(&self.mailbox),
                Arc::clone(&self.event_bus),
            );
            let cancel = self.cancellation_token.child_token();
            let states = Arc::clone(&self.component_states);
            let event_bus = Arc::clone(&self.event_bus);
            self.set_component_state("upload", ComponentState::Running)
                .await;

            self.tasks.push((
                "upload",
                tokio::spawn(async move {
                    if let Err(e) = server.start(cancel).await {
                        event_bus.publish(KnocklyEvent::SystemError {
                            component: "upload".to_string(),
                            error: e.to_string(),
                        });
                        states
                            .lock()
                            .await
                            .insert("upload".to_string(), ComponentState::Failed);
                    }
                }),
            ));
        }
    }

    pub(super) fn upload_enabled(&self) -> bool {
        cfg!(feature = "upload") && self.config.upload.enabled
    }
}
