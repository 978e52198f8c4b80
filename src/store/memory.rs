use super::{EncodingRecord, EncodingStore};
use crate::error::StoreError;
use crate::recognition::FaceEncoding;
use async_trait::async_trait;
use parking_lot::RwLock;

/// In-process store backing the tests
#[derive(Default)]
pub struct MemoryEncodingStore {
    records: RwLock<Vec<EncodingRecord>>,
    reject_writes: bool,
}

impl MemoryEncodingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose inserts always fail
    pub fn read_only() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            reject_writes: true,
        }
    }

    pub fn with_records(records: Vec<EncodingRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            reject_writes: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.records.read().iter().map(|r| r.label.clone()).collect()
    }
}

#[async_trait]
impl EncodingStore for MemoryEncodingStore {
    async fn insert(
        &self,
        doorbell_id: u32,
        label: &str,
        encoding: &FaceEncoding,
    ) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::Write {
                label: label.to_string(),
                details: "store is read-only".to_string(),
            });
        }
        self.records
            .write()
            .push(EncodingRecord::new(doorbell_id, label, encoding.clone()));
        Ok(())
    }

    async fn fetch_all(&self, doorbell_id: u32) -> Result<Vec<EncodingRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.doorbell_id == doorbell_id)
            .cloned()
            .collect())
    }
}
