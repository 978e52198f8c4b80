use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::FrameData;
#[cfg(all(feature = "camera", target_os = "linux"))]
use crate::frame::Rotation;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer::prelude::*;
#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer::Pipeline;
#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer_app::AppSink;
#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer_video::VideoInfo;
#[cfg(all(feature = "camera", target_os = "linux"))]
use tracing::{error, trace};

/// How long `capture` waits for a fresh frame
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

/// Anything that can hand the live loop one frame at a time
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn start(&self) -> Result<(), CameraError>;

    /// Wait for the next frame produced after this call
    async fn capture(&self) -> Result<FrameData, CameraError>;

    async fn stop(&self) -> Result<(), CameraError>;

    fn is_running(&self) -> bool;
}

/// GStreamer camera delivering rotated RGB frames
pub struct CameraInterface {
    config: CameraConfig,
    frame_counter: Arc<AtomicU64>,
    is_running: Arc<AtomicBool>,
    latest: Arc<watch::Sender<Option<FrameData>>>,
    #[cfg(all(feature = "camera", target_os = "linux"))]
    pipeline: Pipeline,
    capture_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CameraInterface {
    /// Create the camera; nothing is captured until [`FrameSource::start`]
    pub async fn new(config: CameraConfig) -> Result<Self, CameraError> {
        info!(
            "Initializing camera {} via {} ({}x{} @ {}fps)",
            config.index, config.source, config.resolution.0, config.resolution.1, config.fps
        );

        #[cfg(all(feature = "camera", target_os = "linux"))]
        let pipeline = {
            gstreamer::init().map_err(|e| CameraError::Configuration {
                details: format!("Failed to initialize GStreamer: {}", e),
            })?;
            let description = build_pipeline_string(&config)?;
            info!("Creating GStreamer pipeline: {}", description);

            gstreamer::parse::launch(&description)
                .map_err(|e| CameraError::Configuration {
                    details: format!("Failed to create pipeline: {}", e),
                })?
                .downcast::<Pipeline>()
                .map_err(|_| CameraError::Configuration {
                    details: "Failed to downcast to Pipeline".to_string(),
                })?
        };

        let (latest, _) = watch::channel(None);

        Ok(Self {
            config,
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(latest),
            #[cfg(all(feature = "camera", target_os = "linux"))]
            pipeline,
            capture_task: tokio::sync::Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    fn start_pipeline(&self) -> Result<(), CameraError> {
        let appsink = self
            .pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Failed to get appsink element".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        let latest = Arc::clone(&self.latest);
        let frame_counter = Arc::clone(&self.frame_counter);

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    match sample_to_frame(&sample, &frame_counter) {
                        Ok(frame) => {
                            trace!("Captured frame {} ({}x{})", frame.id, frame.width(), frame.height());
                            latest.send_replace(Some(frame));
                        }
                        Err(e) => error!("Error processing camera sample: {}", e),
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to start pipeline: {}", e),
            })?;

        info!("GStreamer pipeline started successfully");
        Ok(())
    }

    /// Synthetic frames when no camera backend is compiled in
    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    async fn start_mock_loop(&self) {
        let config = self.config.clone();
        let is_running = Arc::clone(&self.is_running);
        let latest = Arc::clone(&self.latest);
        let frame_counter = Arc::clone(&self.frame_counter);

        warn!("Camera feature disabled; producing synthetic frames");

        let task = tokio::spawn(async move {
            let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);
            let mut interval_timer = tokio::time::interval(frame_interval);

            while is_running.load(Ordering::Relaxed) {
                interval_timer.tick().await;

                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let (width, height) = config.resolution;
                let level = (frame_id % 256) as u8;
                let image = image::RgbImage::from_pixel(width, height, image::Rgb([level; 3]));
                latest.send_replace(Some(FrameData::new(
                    frame_id,
                    std::time::SystemTime::now(),
                    image,
                )));
            }

            debug!("Synthetic capture loop stopped");
        });

        *self.capture_task.lock().await = Some(task);
    }
}

#[async_trait]
impl FrameSource for CameraInterface {
    async fn start(&self) -> Result<(), CameraError> {
        if self.is_running.swap(true, Ordering::Relaxed) {
            warn!("Camera capture is already running");
            return Ok(());
        }

        info!("Starting camera capture");

        #[cfg(all(feature = "camera", target_os = "linux"))]
        {
            if let Err(e) = self.start_pipeline() {
                self.is_running.store(false, Ordering::Relaxed);
                return Err(e);
            }
        }

        #[cfg(not(all(feature = "camera", target_os = "linux")))]
        {
            self.start_mock_loop().await;
        }

        Ok(())
    }

    async fn capture(&self) -> Result<FrameData, CameraError> {
        if !self.is_running.load(Ordering::Relaxed) {
            return Err(CameraError::NotRunning);
        }

        // A fresh subscription has already seen the current frame
        let mut receiver = self.latest.subscribe();

        match tokio::time::timeout(CAPTURE_TIMEOUT, receiver.changed()).await {
            Ok(Ok(())) => receiver
                .borrow_and_update()
                .clone()
                .ok_or_else(|| CameraError::Capture {
                    details: "empty frame slot".to_string(),
                }),
            Ok(Err(_)) => Err(CameraError::NotRunning),
            Err(_) => Err(CameraError::Capture {
                details: format!("no frame within {:?}", CAPTURE_TIMEOUT),
            }),
        }
    }

    async fn stop(&self) -> Result<(), CameraError> {
        if !self.is_running.swap(false, Ordering::Relaxed) {
            debug!("Camera capture is not running");
            return Ok(());
        }

        info!("Stopping camera capture");

        #[cfg(all(feature = "camera", target_os = "linux"))]
        {
            self.pipeline
                .set_state(gstreamer::State::Null)
                .map_err(|e| CameraError::Configuration {
                    details: format!("Failed to stop pipeline: {}", e),
                })?;
        }

        if let Some(task) = self.capture_task.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(3), task).await.is_err() {
                warn!("Capture task did not complete within timeout");
            }
        }

        info!("Camera capture stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

/// Build the capture pipeline: source, size/rate caps, rotation, RGB appsink
#[cfg(all(feature = "camera", target_os = "linux"))]
pub(crate) fn build_pipeline_string(config: &CameraConfig) -> Result<String, CameraError> {
    let (width, height) = config.resolution;

    let source = match config.source.as_str() {
        "libcamera" => "libcamerasrc".to_string(),
        "v4l2" => format!("v4l2src device=/dev/video{}", config.index),
        other => {
            return Err(CameraError::Configuration {
                details: format!("Unknown camera source '{}'", other),
            })
        }
    };

    let flip = match config.rotation {
        Some(Rotation::Rotate90) => "videoflip method=clockwise ! ",
        Some(Rotation::Rotate180) => "videoflip method=rotate-180 ! ",
        Some(Rotation::Rotate270) => "videoflip method=counterclockwise ! ",
        None => "",
    };

    Ok(format!(
        "{} ! video/x-raw,width={},height={},framerate={}/1 ! \
         videoconvert ! {}video/x-raw,format=RGB ! \
         appsink name=sink sync=false max-buffers=1 drop=true",
        source, width, height, config.fps, flip
    ))
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn sample_to_frame(
    sample: &gstreamer::Sample,
    frame_counter: &AtomicU64,
) -> Result<FrameData, CameraError> {
    let buffer = sample.buffer().ok_or_else(|| CameraError::Capture {
        details: "No buffer in sample".to_string(),
    })?;
    let caps = sample.caps().ok_or_else(|| CameraError::Capture {
        details: "No caps in sample".to_string(),
    })?;
    let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::Capture {
        details: format!("Failed to get video info: {}", e),
    })?;
    let map = buffer.map_readable().map_err(|e| CameraError::Capture {
        details: format!("Failed to map buffer: {}", e),
    })?;

    FrameData::from_rgb_bytes(
        frame_counter.fetch_add(1, Ordering::Relaxed),
        std::time::SystemTime::now(),
        video_info.width(),
        video_info.height(),
        video_info.stride()[0] as usize,
        map.as_slice(),
    )
    .ok_or_else(|| CameraError::Capture {
        details: "Truncated frame buffer".to_string(),
    })
}
