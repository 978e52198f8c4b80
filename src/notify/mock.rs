use super::{NotificationKind, Notifier};
use crate::error::NotifyError;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Notifier that records every call instead of reaching the relay
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(NotificationKind, u32)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(NotificationKind, u32)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, kind: NotificationKind, doorbell_id: u32) -> Result<(), NotifyError> {
        self.calls.lock().push((kind, doorbell_id));
        if self.fail {
            Err(NotifyError::Status {
                status: 503,
                reason: "Service Unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
