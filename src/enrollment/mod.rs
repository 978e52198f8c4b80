#[cfg(test)]
pub(crate) mod mock;
mod pipeline;
mod video;

pub use pipeline::{sample_indices, AssetOutcome, CycleReport, EnrollmentPipeline, VideoAsset};
pub use video::{GstVideoDecoder, VideoDecoder, VideoProperties, VideoReader};
