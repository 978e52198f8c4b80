use super::engine::{FaceEncoding, FaceEngine, FaceRegion};
use crate::error::RecognitionError;
use crate::frame::Rotation;
use image::RgbImage;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Orientations tried by [`RecognitionGateway::encode_any_orientation`], in order
pub const ORIENTATIONS: [Option<Rotation>; 4] = [
    None,
    Some(Rotation::Rotate90),
    Some(Rotation::Rotate180),
    Some(Rotation::Rotate270),
];

/// A face found in one pass: where it is and what it encodes to
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub region: FaceRegion,
    pub encoding: FaceEncoding,
}

/// Single entry point to the face engine.
///
/// Exactly one caller runs inside the engine at a time; everybody else waits
/// on the mutex. Calls run on the blocking pool so waiting never stalls the
/// async runtime.
#[derive(Clone)]
pub struct RecognitionGateway {
    engine: Arc<Mutex<Box<dyn FaceEngine>>>,
}

impl RecognitionGateway {
    pub fn new(engine: Box<dyn FaceEngine>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Detect and encode all faces in the image as-is
    pub async fn detect_and_encode(
        &self,
        image: Arc<RgbImage>,
    ) -> Result<Vec<DetectedFace>, RecognitionError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock();
            detect_and_encode_locked(engine.as_mut(), &image)
        })
        .await
        .map_err(|e| RecognitionError::Worker {
            details: e.to_string(),
        })?
    }

    /// Try 0°, 90°, 180° and 270° and return the encodings from the first
    /// orientation in which at least one face is detected.
    ///
    /// The engine lock is held across all attempts for one image.
    pub async fn encode_any_orientation(
        &self,
        image: Arc<RgbImage>,
    ) -> Result<Vec<FaceEncoding>, RecognitionError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock();
            encode_any_orientation_locked(engine.as_mut(), &image)
        })
        .await
        .map_err(|e| RecognitionError::Worker {
            details: e.to_string(),
        })?
    }

    pub fn engine_name(&self) -> String {
        self.engine.lock().name().to_string()
    }
}

fn detect_and_encode_locked(
    engine: &mut dyn FaceEngine,
    image: &RgbImage,
) -> Result<Vec<DetectedFace>, RecognitionError> {
    let regions = engine.detect(image)?;
    if regions.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = engine.encode(image, &regions)?;
    Ok(regions
        .into_iter()
        .zip(encodings)
        .map(|(region, encoding)| DetectedFace { region, encoding })
        .collect())
}

fn encode_any_orientation_locked(
    engine: &mut dyn FaceEngine,
    image: &RgbImage,
) -> Result<Vec<FaceEncoding>, RecognitionError> {
    for orientation in ORIENTATIONS {
        let rotated;
        let candidate = match orientation {
            Some(rotation) => {
                rotated = rotation.apply(image);
                &rotated
            }
            None => image,
        };

        let regions = engine.detect(candidate)?;
        if !regions.is_empty() {
            debug!(
                "Found {} face(s) at {}°",
                regions.len(),
                orientation.map(|r| r.degrees()).unwrap_or(0)
            );
            return engine.encode(candidate, &regions);
        }
    }

    Ok(Vec::new())
}
