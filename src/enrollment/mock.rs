use super::video::{VideoDecoder, VideoProperties, VideoReader};
use crate::error::{ExtractionError, VideoValidationError};
use crate::frame::FrameData;
use crate::recognition::mock::mark_face;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

/// Test "video": the file body is this JSON description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedVideo {
    pub frame_count: u64,
    pub fps: f64,
    /// Grey level of every frame
    pub brightness: u8,
    /// Faces drawn into each frame listed in `face_frames`
    pub faces_per_frame: u32,
    /// Frames carrying faces; `None` means every frame
    pub face_frames: Option<Vec<u64>>,
    /// Frames that fail to decode
    #[serde(default)]
    pub bad_frames: Vec<u64>,
}

impl ScriptedVideo {
    pub fn new(frame_count: u64, fps: f64) -> Self {
        Self {
            frame_count,
            fps,
            brightness: 128,
            faces_per_frame: 1,
            face_frames: None,
            bad_frames: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

struct ScriptedReader {
    video: ScriptedVideo,
}

impl VideoReader for ScriptedReader {
    fn properties(&self) -> VideoProperties {
        VideoProperties {
            frame_count: self.video.frame_count,
            fps: self.video.fps,
        }
    }

    fn read_frame(&mut self, index: u64) -> Result<FrameData, ExtractionError> {
        if index >= self.video.frame_count || self.video.bad_frames.contains(&index) {
            return Err(ExtractionError::FrameRead {
                index,
                details: "corrupt packet".to_string(),
            });
        }

        let width = self.video.faces_per_frame.max(8);
        let level = self.video.brightness;
        let mut image = RgbImage::from_pixel(width, 8, Rgb([level, level, level]));

        let has_faces = self
            .video
            .face_frames
            .as_ref()
            .map(|frames| frames.contains(&index))
            .unwrap_or(true);
        if has_faces {
            for x in 0..self.video.faces_per_frame {
                mark_face(&mut image, x, 0, (x % 256) as u8);
            }
        }

        Ok(FrameData::new(index, SystemTime::now(), image))
    }
}

/// Decoder for [`ScriptedVideo`] files
#[derive(Debug, Default)]
pub struct ScriptedVideoDecoder;

impl VideoDecoder for ScriptedVideoDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>, VideoValidationError> {
        let bytes = std::fs::read(path).map_err(|e| VideoValidationError::Unreadable {
            details: e.to_string(),
        })?;
        let video: ScriptedVideo =
            serde_json::from_slice(&bytes).map_err(|e| VideoValidationError::Unreadable {
                details: e.to_string(),
            })?;
        Ok(Box::new(ScriptedReader { video }))
    }
}
