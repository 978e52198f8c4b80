use crate::error::RecognitionError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Length of a face descriptor produced by the standard encoder
pub const ENCODING_LEN: usize = 128;

/// Face bounding box in pixel coordinates of the image it was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceRegion {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Map a region found on a downscaled image back onto the full frame
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }
}

/// Fixed-length numeric face descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceEncoding(pub Vec<f32>);

impl FaceEncoding {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Face detection and encoding primitive.
///
/// Implementations are not reentrant; callers must go through
/// [`RecognitionGateway`](super::RecognitionGateway) rather than invoking an
/// engine directly.
pub trait FaceEngine: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError>;

    fn encode(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, RecognitionError>;

    fn name(&self) -> &str;
}

/// Distance metric plus the authoritative match predicate
pub trait FaceComparator: Send + Sync {
    fn distance(&self, known: &FaceEncoding, candidate: &FaceEncoding) -> f32;

    fn matches(&self, known: &FaceEncoding, candidate: &FaceEncoding) -> bool;
}

/// Euclidean distance with a fixed tolerance
#[derive(Debug, Clone, Copy)]
pub struct EuclideanComparator {
    tolerance: f32,
}

impl EuclideanComparator {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }
}

impl Default for EuclideanComparator {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl FaceComparator for EuclideanComparator {
    fn distance(&self, known: &FaceEncoding, candidate: &FaceEncoding) -> f32 {
        if known.len() != candidate.len() {
            return f32::INFINITY;
        }
        known
            .as_slice()
            .iter()
            .zip(candidate.as_slice())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }

    fn matches(&self, known: &FaceEncoding, candidate: &FaceEncoding) -> bool {
        self.distance(known, candidate) <= self.tolerance
    }
}

/// Engine that never finds a face.
///
/// Used when no recognition backend is linked into the binary so that the
/// rest of the daemon (serial link, mailbox, uploads) keeps working.
#[derive(Debug, Default)]
pub struct NullFaceEngine {
    warned: bool,
}

impl FaceEngine for NullFaceEngine {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError> {
        if !self.warned {
            warn!("No face recognition backend configured; detection always returns no faces");
            self.warned = true;
        }
        Ok(Vec::new())
    }

    fn encode(
        &mut self,
        _image: &RgbImage,
        _regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, RecognitionError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "null"
    }
}
