use crate::error::{ExtractionError, VideoValidationError};
use crate::frame::FrameData;
use std::path::Path;

/// Container-level facts needed for validation and sampling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProperties {
    pub frame_count: u64,
    pub fps: f64,
}

impl VideoProperties {
    /// Duration in seconds, zero when the frame rate is unknown
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// An opened video positioned by frame index
pub trait VideoReader: Send {
    fn properties(&self) -> VideoProperties;

    /// Seek to `index` and decode that frame
    fn read_frame(&mut self, index: u64) -> Result<FrameData, ExtractionError>;
}

/// Opens uploaded videos for enrollment
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoValidationError>;
}

/// GStreamer-backed decoder (`filesrc ! decodebin ! videoconvert ! appsink`)
#[derive(Debug, Default, Clone)]
pub struct GstVideoDecoder;

impl GstVideoDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst {
    use super::{VideoProperties, VideoReader};
    use crate::error::{ExtractionError, VideoValidationError};
    use crate::frame::FrameData;
    use gstreamer::prelude::*;
    use gstreamer::{ClockTime, Pipeline, SeekFlags, State};
    use gstreamer_app::AppSink;
    use gstreamer_video::VideoInfo;
    use std::path::Path;
    use std::time::SystemTime;
    use tracing::debug;

    const STATE_TIMEOUT_SECONDS: u64 = 10;

    pub struct GstVideoReader {
        pipeline: Pipeline,
        appsink: AppSink,
        properties: VideoProperties,
    }

    fn unreadable(details: impl Into<String>) -> VideoValidationError {
        VideoValidationError::Unreadable {
            details: details.into(),
        }
    }

    impl GstVideoReader {
        pub fn open(path: &Path) -> Result<Self, VideoValidationError> {
            gstreamer::init().map_err(|e| unreadable(format!("GStreamer init: {}", e)))?;

            let pipeline = gstreamer::parse::launch(
                "filesrc name=src ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
                 appsink name=sink sync=false max-buffers=1",
            )
            .map_err(|e| unreadable(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| unreadable("Failed to downcast to Pipeline"))?;

            let source = pipeline
                .by_name("src")
                .ok_or_else(|| unreadable("Failed to get filesrc element"))?;
            source.set_property("location", path.to_string_lossy().to_string());

            let appsink = pipeline
                .by_name("sink")
                .ok_or_else(|| unreadable("Failed to get appsink element"))?
                .downcast::<AppSink>()
                .map_err(|_| unreadable("Failed to downcast to AppSink"))?;

            pipeline
                .set_state(State::Paused)
                .map_err(|e| unreadable(format!("Failed to preroll: {}", e)))?;
            let (result, _, _) = pipeline.state(ClockTime::from_seconds(STATE_TIMEOUT_SECONDS));
            result.map_err(|e| unreadable(format!("Failed to preroll: {}", e)))?;

            let preroll = appsink
                .pull_preroll()
                .map_err(|e| unreadable(format!("No decodable video stream: {}", e)))?;
            let caps = preroll
                .caps()
                .ok_or_else(|| unreadable("No caps on decoded stream"))?;
            let info = VideoInfo::from_caps(caps)
                .map_err(|e| unreadable(format!("Failed to get video info: {}", e)))?;

            let fps = info.fps();
            let fps = if fps.denom() > 0 {
                fps.numer() as f64 / fps.denom() as f64
            } else {
                0.0
            };

            let duration = pipeline
                .query_duration::<ClockTime>()
                .map(|d| d.nseconds() as f64 / 1_000_000_000.0)
                .unwrap_or(0.0);
            let frame_count = (duration * fps).round() as u64;

            debug!(
                "Opened {} ({}x{}, {:.2} fps, {} frames)",
                path.display(),
                info.width(),
                info.height(),
                fps,
                frame_count
            );

            Ok(Self {
                pipeline,
                appsink,
                properties: VideoProperties { frame_count, fps },
            })
        }
    }

    impl VideoReader for GstVideoReader {
        fn properties(&self) -> VideoProperties {
            self.properties
        }

        fn read_frame(&mut self, index: u64) -> Result<FrameData, ExtractionError> {
            let frame_error = |details: String| ExtractionError::FrameRead { index, details };

            if self.properties.fps <= 0.0 {
                return Err(frame_error("unknown frame rate".to_string()));
            }
            let position = ClockTime::from_nseconds(
                (index as f64 * 1_000_000_000.0 / self.properties.fps) as u64,
            );

            self.pipeline
                .seek_simple(SeekFlags::FLUSH | SeekFlags::ACCURATE, position)
                .map_err(|e| frame_error(format!("seek failed: {}", e)))?;
            let (result, _, _) = self
                .pipeline
                .state(ClockTime::from_seconds(STATE_TIMEOUT_SECONDS));
            result.map_err(|e| frame_error(format!("seek did not settle: {}", e)))?;

            let sample = self
                .appsink
                .pull_preroll()
                .map_err(|e| frame_error(format!("no frame after seek: {}", e)))?;
            let caps = sample
                .caps()
                .ok_or_else(|| frame_error("no caps in sample".to_string()))?;
            let info = VideoInfo::from_caps(caps)
                .map_err(|e| frame_error(format!("failed to get video info: {}", e)))?;
            let buffer = sample
                .buffer()
                .ok_or_else(|| frame_error("no buffer in sample".to_string()))?;
            let map = buffer
                .map_readable()
                .map_err(|e| frame_error(format!("failed to map buffer: {}", e)))?;

            FrameData::from_rgb_bytes(
                index,
                SystemTime::now(),
                info.width(),
                info.height(),
                info.stride()[0] as usize,
                map.as_slice(),
            )
            .ok_or_else(|| frame_error("truncated frame buffer".to_string()))
        }
    }

    impl Drop for GstVideoReader {
        fn drop(&mut self) {
            let _ = self.pipeline.set_state(State::Null);
        }
    }
}

impl VideoDecoder for GstVideoDecoder {
    #[cfg(all(feature = "camera", target_os = "linux"))]
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoValidationError> {
        Ok(Box::new(gst::GstVideoReader::open(path)?))
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoValidationError> {
        Err(VideoValidationError::Unreadable {
            details: format!(
                "{}: video decoding requires the camera feature on Linux",
                path.display()
            ),
        })
    }
}
