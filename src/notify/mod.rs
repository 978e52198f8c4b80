//! Push-notification relay client.
//!
//! The relay is an external HTTP service; every failure is logged by the
//! caller and never interrupts the loop that triggered the notification.

#[cfg(test)]
pub(crate) mod mock;

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Why the relay is being asked to notify the doorbell's users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The physical doorbell button was pressed
    DoorbellRung,
    /// Unknown faces were seen in front of the door
    PossibleVisitor,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: NotificationKind, doorbell_id: u32) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct NotifyRequest<'a> {
    token: &'a str,
    event: NotificationKind,
    doorbell_id: u32,
}

/// Relay client that posts the doorbell token to the notification endpoint
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
    token_path: PathBuf,
}

impl HttpNotifier {
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.endpoint
            ),
            token_path: config.token_path.clone(),
        })
    }

    /// The token is re-read per request so a re-provisioned doorbell needs no restart
    async fn read_token(&self) -> Result<String, NotifyError> {
        match tokio::fs::read_to_string(&self.token_path).await {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(NotifyError::TokenMissing {
                path: self.token_path.display().to_string(),
            }),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, kind: NotificationKind, doorbell_id: u32) -> Result<(), NotifyError> {
        let token = self.read_token().await?;

        debug!("Posting {:?} notification to {}", kind, self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&NotifyRequest {
                token: &token,
                event: kind,
                doorbell_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        info!("Notification {:?} delivered for doorbell {}", kind, doorbell_id);
        Ok(())
    }
}

/// Send a notification in the background; failures are logged only
pub fn spawn_notification(
    notifier: Arc<dyn Notifier>,
    kind: NotificationKind,
    doorbell_id: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(kind, doorbell_id).await {
            error!("Notification {:?} failed: {}", kind, e);
        }
    })
}
