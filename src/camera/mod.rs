mod interface;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub use interface::{CameraInterface, FrameSource};
