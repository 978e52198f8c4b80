use super::annotate::FrameAnnotator;
use super::cooldown::CooldownPolicy;
use crate::camera::FrameSource;
use crate::config::RecognitionConfig;
use crate::error::RecognitionError;
use crate::events::{EventBus, KnocklyEvent};
use crate::frame::FrameData;
use crate::hardware::{HardwareCommand, HardwareLink};
use crate::notify::{spawn_notification, NotificationKind, Notifier};
use crate::recognition::{FaceComparator, FaceRegion, Identity, KnownFaceSet, RecognitionGateway};
use crate::store::EncodingStore;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Decision taken for one frame
#[derive(Debug, Clone, PartialEq)]
pub enum LiveAction {
    /// No faces in the frame
    Idle,
    /// Faces present but the cooldown window has not elapsed
    Suppressed,
    Allowed { label: String },
    Blocked { label: String },
    VisitorNotified { faces: usize },
}

/// Faces found in one frame (regions in full-frame coordinates) and what was done
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub faces: Vec<(FaceRegion, Identity)>,
    pub action: LiveAction,
}

/// Everything the live loop needs besides its own state
pub struct LiveDependencies {
    pub source: Arc<dyn FrameSource>,
    pub gateway: RecognitionGateway,
    pub comparator: Arc<dyn FaceComparator>,
    pub link: Arc<HardwareLink>,
    pub notifier: Arc<dyn Notifier>,
    pub event_bus: Arc<EventBus>,
}

/// Camera-driven recognition with cooldown-gated actuation
pub struct LiveRecognitionLoop {
    deps: LiveDependencies,
    known: KnownFaceSet,
    cooldown: CooldownPolicy,
    downscale: u32,
    idle_sleep: Duration,
    doorbell_id: u32,
    annotator: Option<FrameAnnotator>,
}

impl LiveRecognitionLoop {
    pub fn new(
        deps: LiveDependencies,
        known: KnownFaceSet,
        config: &RecognitionConfig,
        doorbell_id: u32,
    ) -> Self {
        Self {
            deps,
            known,
            cooldown: CooldownPolicy::new(config.cooldown()),
            downscale: config.downscale.max(1),
            idle_sleep: Duration::from_millis(config.idle_sleep_ms),
            doorbell_id,
            annotator: None,
        }
    }

    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Snapshot the store for this doorbell. A failed read leaves the set
    /// empty so every face is reported as unknown.
    pub async fn load_known_faces(store: &dyn EncodingStore, doorbell_id: u32) -> KnownFaceSet {
        match store.fetch_all(doorbell_id).await {
            Ok(records) => {
                info!("Loaded {} known face encodings", records.len());
                KnownFaceSet::new(records)
            }
            Err(e) => {
                error!("Loading known faces: {}", e);
                KnownFaceSet::default()
            }
        }
    }

    pub fn known_faces(&self) -> &KnownFaceSet {
        &self.known
    }

    /// Capture and process frames until cancelled. Camera and recognition
    /// failures are logged and the loop moves on to the next frame.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Running live facial recognition");

        while !cancel.is_cancelled() {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = self.deps.source.capture() => frame,
            };

            match frame {
                Ok(frame) => {
                    if let Err(e) = self.process_frame(&frame, Instant::now()).await {
                        error!("Recognition failed: {}", e);
                    }
                }
                Err(e) => warn!("Camera read failed: {}", e),
            }

            if !self.idle_sleep.is_zero() {
                tokio::time::sleep(self.idle_sleep).await;
            }
        }

        info!("Live recognition stopped");
    }

    /// Detect, identify and act on one frame
    pub async fn process_frame(
        &mut self,
        frame: &FrameData,
        now: Instant,
    ) -> Result<FrameOutcome, RecognitionError> {
        let small = Arc::new(frame.downscaled(self.downscale));
        let detected = self.deps.gateway.detect_and_encode(small).await?;

        let faces: Vec<(FaceRegion, Identity)> = detected
            .iter()
            .map(|face| {
                let identity = self
                    .known
                    .identify(self.deps.comparator.as_ref(), &face.encoding);
                (face.region.scaled(self.downscale), identity)
            })
            .collect();

        let action = self.decide(&faces, now).await;

        if let Some(annotator) = self.annotator.as_mut() {
            annotator.maybe_snapshot(&frame.image, &faces, now).await;
        }

        Ok(FrameOutcome { faces, action })
    }

    async fn decide(&mut self, faces: &[(FaceRegion, Identity)], now: Instant) -> LiveAction {
        if faces.is_empty() {
            return LiveAction::Idle;
        }
        if !self.cooldown.try_acquire(now) {
            debug!("{} face(s) in cooldown window", faces.len());
            return LiveAction::Suppressed;
        }

        // First recognized face in detector order decides
        let first_known = faces.iter().find_map(|(_, identity)| match identity {
            Identity::Known { label, blocked } => Some((label.clone(), *blocked)),
            Identity::Unknown => None,
        });

        match first_known {
            Some((label, false)) => {
                let _ = self.deps.link.send(HardwareCommand::FaceAllowed).await;
                self.deps.event_bus.publish(KnocklyEvent::FaceRecognized {
                    label: label.clone(),
                    timestamp: SystemTime::now(),
                });
                LiveAction::Allowed { label }
            }
            Some((label, true)) => {
                let _ = self.deps.link.send(HardwareCommand::FaceBlocked).await;
                self.deps.event_bus.publish(KnocklyEvent::FaceBlocked {
                    label: label.clone(),
                    timestamp: SystemTime::now(),
                });
                LiveAction::Blocked { label }
            }
            None => {
                spawn_notification(
                    Arc::clone(&self.deps.notifier),
                    NotificationKind::PossibleVisitor,
                    self.doorbell_id,
                );
                self.deps.event_bus.publish(KnocklyEvent::VisitorDetected {
                    faces: faces.len(),
                    timestamp: SystemTime::now(),
                });
                LiveAction::VisitorNotified { faces: faces.len() }
            }
        }
    }
}
