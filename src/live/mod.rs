mod annotate;
mod cooldown;
mod recognizer;

pub use annotate::FrameAnnotator;
pub use cooldown::CooldownPolicy;
pub use recognizer::{FrameOutcome, LiveAction, LiveDependencies, LiveRecognitionLoop};
