use super::video::{VideoDecoder, VideoReader};
use crate::config::EnrollmentConfig;
use crate::error::{ExtractionError, VideoValidationError};
use crate::events::{EventBus, KnocklyEvent};
use crate::frame::FrameData;
use crate::recognition::RecognitionGateway;
use crate::store::EncodingStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// An uploaded video seen during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl VideoAsset {
    /// Label stored with every encoding taken from this asset
    pub fn label(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }

    fn fingerprint(&self) -> (u64, Option<SystemTime>) {
        (self.size, self.modified)
    }
}

/// What one discovery cycle did with one asset
#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    /// Size changed during the observation window
    StillUploading,
    /// A same-named file is already in the processed directory
    AlreadyArchived,
    /// Rejected earlier and unchanged since
    PreviouslyRejected,
    Rejected { reason: String },
    Archived { stored: usize },
    /// Extraction ran but the move into the processed directory failed
    ArchiveFailed { stored: usize, details: String },
}

/// Per-asset results of one cycle, in listing order
#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, AssetOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, name: &str) -> Option<&AssetOutcome> {
        self.outcomes
            .iter()
            .find(|(asset, _)| asset == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn stored_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                AssetOutcome::Archived { stored } | AssetOutcome::ArchiveFailed { stored, .. } => {
                    *stored
                }
                _ => 0,
            })
            .sum()
    }
}

/// At most `count` frame indices spread evenly over the whole video
pub fn sample_indices(total_frames: u64, count: usize) -> Vec<u64> {
    let samples = (count as u64).min(total_frames);
    (0..samples).map(|i| i * total_frames / samples).collect()
}

/// Turns uploaded videos into stored face encodings.
///
/// Per asset: stability check, archive check, validation, extraction,
/// archival, strictly in that order. Failures stay with the asset that
/// caused them.
pub struct EnrollmentPipeline {
    config: EnrollmentConfig,
    doorbell_id: u32,
    gateway: RecognitionGateway,
    store: Arc<dyn EncodingStore>,
    decoder: Arc<dyn VideoDecoder>,
    event_bus: Arc<EventBus>,
    rejected: HashMap<String, (u64, Option<SystemTime>)>,
}

impl EnrollmentPipeline {
    pub fn new(
        config: EnrollmentConfig,
        doorbell_id: u32,
        gateway: RecognitionGateway,
        store: Arc<dyn EncodingStore>,
        decoder: Arc<dyn VideoDecoder>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            doorbell_id,
            gateway,
            store,
            decoder,
            event_bus,
            rejected: HashMap::new(),
        }
    }

    /// Poll the ingestion directory until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "Watching {} for .{} uploads every {:?}",
            self.config.ingest_dir.display(),
            self.config.extension,
            self.config.poll_interval()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.run_cycle().await;
            if !report.outcomes.is_empty() {
                debug!("Enrollment cycle: {:?}", report.outcomes);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        info!("Enrollment pipeline stopped");
    }

    /// One discovery pass over the ingestion directory
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let candidates = match self.discover().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(
                    "Listing {}: {}",
                    self.config.ingest_dir.display(),
                    e
                );
                return report;
            }
        };
        if candidates.is_empty() {
            return report;
        }

        tokio::time::sleep(self.config.stability_window()).await;

        for before in candidates {
            let outcome = self.process_candidate(&before).await;
            report.outcomes.push((before.name.clone(), outcome));
        }

        report
    }

    async fn process_candidate(&mut self, before: &VideoAsset) -> AssetOutcome {
        let asset = match stat_asset(&before.path).await {
            Some(after) if after.size == before.size => after,
            _ => {
                debug!("{} is still uploading", before.name);
                return AssetOutcome::StillUploading;
            }
        };

        if self.is_archived(&asset).await {
            debug!("{} already processed", asset.name);
            return AssetOutcome::AlreadyArchived;
        }

        if self.rejected.get(&asset.name) == Some(&asset.fingerprint()) {
            return AssetOutcome::PreviouslyRejected;
        }

        info!("Validating video: {}", asset.name);
        let reader = match self.validate(&asset).await {
            Ok(reader) => reader,
            Err(e) => {
                error!("Rejecting {}: {}", asset.name, e);
                self.rejected.insert(asset.name.clone(), asset.fingerprint());
                self.event_bus.publish(KnocklyEvent::EnrollmentRejected {
                    asset: asset.name.clone(),
                    reason: e.to_string(),
                });
                return AssetOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };
        self.rejected.remove(&asset.name);

        let stored = self.extract(&asset, reader).await;
        info!("Stored {} encodings for {}", stored, asset.label());

        match self.archive(&asset).await {
            Ok(destination) => {
                debug!("Archived {} to {}", asset.name, destination.display());
                self.event_bus.publish(KnocklyEvent::EnrollmentCompleted {
                    asset: asset.name.clone(),
                    stored,
                });
                AssetOutcome::Archived { stored }
            }
            Err(e) => {
                error!("Archiving {}: {}", asset.name, e);
                AssetOutcome::ArchiveFailed {
                    stored,
                    details: e.to_string(),
                }
            }
        }
    }

    /// Files with the configured extension, in listing order
    pub async fn discover(&self) -> std::io::Result<Vec<VideoAsset>> {
        let mut entries = match fs::read_dir(&self.config.ingest_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut assets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches_extension = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(self.config.extension.as_str()))
                .unwrap_or(false);
            if !matches_extension {
                continue;
            }
            if let Some(asset) = stat_asset(&path).await {
                assets.push(asset);
            }
        }

        Ok(assets)
    }

    /// Whether a same-named file already exists in the processed directory
    pub async fn is_archived(&self, asset: &VideoAsset) -> bool {
        fs::try_exists(self.config.processed_dir.join(&asset.name))
            .await
            .unwrap_or(false)
    }

    /// Open the video and apply the duration and brightness gates
    pub async fn validate(
        &self,
        asset: &VideoAsset,
    ) -> Result<Box<dyn VideoReader>, VideoValidationError> {
        let decoder = Arc::clone(&self.decoder);
        let path = asset.path.clone();
        let minimum_seconds = self.config.min_duration_seconds;
        let threshold = self.config.brightness_threshold;

        tokio::task::spawn_blocking(move || {
            let mut reader = decoder.open(&path)?;

            let properties = reader.properties();
            let duration_seconds = properties.duration_seconds();
            if duration_seconds < minimum_seconds {
                return Err(VideoValidationError::TooShort {
                    duration_seconds,
                    minimum_seconds,
                });
            }

            let first = reader
                .read_frame(0)
                .map_err(|e| VideoValidationError::NoFrames {
                    details: e.to_string(),
                })?;
            let brightness = first.mean_luminance();
            if brightness < threshold {
                return Err(VideoValidationError::TooDark {
                    brightness,
                    threshold,
                });
            }

            info!("Video OK ({:.1}s)", duration_seconds);
            Ok(reader)
        })
        .await
        .map_err(|e| VideoValidationError::Unreadable {
            details: e.to_string(),
        })?
    }

    /// Sample frames, encode every face found and persist up to the cap.
    ///
    /// Returns the number of encodings stored. Bad frames and store
    /// failures are logged and skipped.
    pub async fn extract(&self, asset: &VideoAsset, reader: Box<dyn VideoReader>) -> usize {
        let label = asset.label();
        let indices = sample_indices(reader.properties().frame_count, self.config.sample_count);
        let mut reader = Some(reader);
        let mut stored = 0;

        'frames: for index in indices {
            let Some(current) = reader.take() else {
                break;
            };
            let (returned, frame) = match read_frame_blocking(current, index).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!("Decoder worker failed on {}: {}", asset.name, e);
                    break;
                }
            };
            reader = Some(returned);

            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("{}: {}", asset.name, e);
                    continue;
                }
            };

            let encodings = match self.gateway.encode_any_orientation(Arc::clone(&frame.image)).await
            {
                Ok(encodings) => encodings,
                Err(source) => {
                    warn!(
                        "{}: {}",
                        asset.name,
                        ExtractionError::Recognition { index, source }
                    );
                    continue;
                }
            };

            for encoding in &encodings {
                match self.store.insert(self.doorbell_id, &label, encoding).await {
                    Ok(()) => {
                        stored += 1;
                        debug!("Stored encoding for {}", label);
                    }
                    Err(e) => error!("{}", e),
                }
                if stored >= self.config.max_encodings {
                    break 'frames;
                }
            }
        }

        stored
    }

    /// Move the asset into the processed directory
    pub async fn archive(&self, asset: &VideoAsset) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.config.processed_dir).await?;
        let destination = self.config.processed_dir.join(&asset.name);

        if let Err(e) = fs::rename(&asset.path, &destination).await {
            // Different filesystem; fall back to copy and delete
            debug!("Rename of {} failed ({}), copying", asset.name, e);
            fs::copy(&asset.path, &destination).await?;
            fs::remove_file(&asset.path).await?;
        }

        Ok(destination)
    }
}

async fn stat_asset(path: &Path) -> Option<VideoAsset> {
    let metadata = fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    let name = path.file_name()?.to_string_lossy().to_string();
    Some(VideoAsset {
        path: path.to_path_buf(),
        name,
        size: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

async fn read_frame_blocking(
    mut reader: Box<dyn VideoReader>,
    index: u64,
) -> Result<(Box<dyn VideoReader>, Result<FrameData, ExtractionError>), tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || {
        let frame = reader.read_frame(index);
        (reader, frame)
    })
    .await
}
