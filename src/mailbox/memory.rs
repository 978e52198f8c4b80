use super::Mailbox;
use crate::error::MailboxError;
use crate::hardware::HardwareCommand;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

/// In-process mailbox with capacity one; posting overwrites
#[derive(Default)]
pub struct MemoryMailbox {
    slot: Mutex<Option<HardwareCommand>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn check(&self) -> Option<HardwareCommand> {
        self.slot.lock().take()
    }

    async fn post(&self, command: HardwareCommand) -> Result<(), MailboxError> {
        if let Some(previous) = self.slot.lock().replace(command) {
            debug!("Mailbox command {} replaced by {}", previous, command);
        }
        Ok(())
    }
}
