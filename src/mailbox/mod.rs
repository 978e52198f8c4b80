mod file;
mod memory;
mod poller;

pub use file::FileMailbox;
pub use memory::MemoryMailbox;
pub use poller::{CommandPoller, TickReport};

use crate::error::MailboxError;
use crate::hardware::HardwareCommand;
use async_trait::async_trait;

/// Single-slot, best-effort command channel into the hardware link.
///
/// At most one command is pending; a newer post replaces an unconsumed one.
/// A command written while the previous one is being consumed may be lost.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Take the pending command, if any. Malformed content is discarded.
    async fn check(&self) -> Option<HardwareCommand>;

    /// Leave a command for the next poll
    async fn post(&self, command: HardwareCommand) -> Result<(), MailboxError>;
}
