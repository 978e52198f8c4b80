pub mod app;
pub mod camera;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod events;
pub mod frame;
pub mod hardware;
pub mod keyboard_input;
pub mod live;
pub mod mailbox;
pub mod notify;
pub mod recognition;
pub mod store;

#[cfg(feature = "upload")]
pub mod upload;

pub use app::{ComponentState, Components, KnocklyOrchestrator, ShutdownReason};
pub use config::KnocklyConfig;
pub use error::{KnocklyError, Result};
pub use events::{EventBus, KnocklyEvent};
pub use frame::{FrameData, Rotation};
pub use hardware::{HardwareCommand, HardwareLink};
