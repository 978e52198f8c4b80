mod engine;
mod gateway;
mod matcher;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use engine::{
    EuclideanComparator, FaceComparator, FaceEncoding, FaceEngine, FaceRegion, NullFaceEngine,
    ENCODING_LEN,
};
pub use gateway::{DetectedFace, RecognitionGateway, ORIENTATIONS};
pub use matcher::{Identity, KnownFaceSet};
