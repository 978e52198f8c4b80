use super::engine::{FaceEncoding, FaceEngine, FaceRegion, ENCODING_LEN};
use crate::error::RecognitionError;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Marker colour the fake engine treats as "a face is here"
pub const FACE_MARKER: Rgb<u8> = Rgb([255, 0, 0]);

/// Paint a face marker whose green channel selects the identity
pub fn mark_face(image: &mut RgbImage, x: u32, y: u32, identity: u8) {
    image.put_pixel(x, y, Rgb([FACE_MARKER[0], identity, 0]));
}

/// Encoding the fake engine produces for a given identity byte
pub fn encoding_for(identity: u8) -> FaceEncoding {
    FaceEncoding(vec![identity as f32 / 255.0; ENCODING_LEN])
}

/// Counters shared between a fake engine and the test observing it
#[derive(Clone, Default)]
pub struct EngineProbe {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    detect_calls: Arc<AtomicUsize>,
}

impl EngineProbe {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

/// Deterministic engine: every marker pixel in an unbroken run from (0, 0)
/// along the top row is a face, and its green channel becomes the identity
/// of the encoding.
#[derive(Default)]
pub struct MarkerFaceEngine {
    pub probe: EngineProbe,
    pub work: Duration,
    pub fail_detect: bool,
}

impl MarkerFaceEngine {
    pub fn with_probe(probe: EngineProbe, work: Duration) -> Self {
        Self {
            probe,
            work,
            fail_detect: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_detect: true,
            ..Self::default()
        }
    }
}

impl FaceEngine for MarkerFaceEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, RecognitionError> {
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.probe.detect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_detect {
            return Err(RecognitionError::Detection {
                details: "engine state corrupted".to_string(),
            });
        }

        // One face per consecutive marker pixel along the top row
        let faces = (0..image.width())
            .take_while(|&x| image.get_pixel(x, 0)[0] == FACE_MARKER[0])
            .map(|x| FaceRegion {
                top: 0,
                right: x + 1,
                bottom: 1,
                left: x,
            })
            .collect();
        Ok(faces)
    }

    fn encode(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<FaceEncoding>, RecognitionError> {
        Ok(regions
            .iter()
            .map(|region| encoding_for(image.get_pixel(region.left, region.top)[1]))
            .collect())
    }

    fn name(&self) -> &str {
        "marker"
    }
}
