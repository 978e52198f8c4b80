use super::Mailbox;
use crate::error::MailboxError;
use crate::hardware::HardwareCommand;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, warn};

/// Marker-file mailbox: the trimmed file content is the command, and the
/// file is deleted when consumed.
pub struct FileMailbox {
    path: PathBuf,
}

impl FileMailbox {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Mailbox for FileMailbox {
    async fn check(&self) -> Option<HardwareCommand> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                error!("Reading command file {}: {}", self.path.display(), e);
                return None;
            }
        };

        if let Err(e) = fs::remove_file(&self.path).await {
            if e.kind() != ErrorKind::NotFound {
                error!("Removing command file {}: {}", self.path.display(), e);
            }
        }

        match content.parse::<HardwareCommand>() {
            Ok(command) => {
                debug!("Mailbox command {}", command);
                Some(command)
            }
            Err(e) => {
                warn!("Discarding command file content: {}", e);
                None
            }
        }
    }

    async fn post(&self, command: HardwareCommand) -> Result<(), MailboxError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Readers only ever see a complete file
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, command.to_string()).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}
