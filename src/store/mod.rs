mod file;
mod memory;
#[cfg(test)]
mod tests;

pub use file::FileEncodingStore;
pub use memory::MemoryEncodingStore;

use crate::error::StoreError;
use crate::recognition::FaceEncoding;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored face encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingRecord {
    pub id: Uuid,
    pub doorbell_id: u32,
    pub label: String,
    pub encoding: FaceEncoding,
    /// Set by the external service; the daemon never flips it
    #[serde(default)]
    pub blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl EncodingRecord {
    pub fn new(doorbell_id: u32, label: &str, encoding: FaceEncoding) -> Self {
        Self {
            id: Uuid::new_v4(),
            doorbell_id,
            label: label.to_string(),
            encoding,
            blocked: false,
            created_at: Utc::now(),
        }
    }
}

/// Append-only persistence for face encodings
#[async_trait]
pub trait EncodingStore: Send + Sync {
    async fn insert(
        &self,
        doorbell_id: u32,
        label: &str,
        encoding: &FaceEncoding,
    ) -> Result<(), StoreError>;

    async fn fetch_all(&self, doorbell_id: u32) -> Result<Vec<EncodingRecord>, StoreError>;
}
