use super::{EncodingRecord, EncodingStore};
use crate::error::StoreError;
use crate::recognition::FaceEncoding;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// JSON-lines store: one [`EncodingRecord`] per line, appended in order
pub struct FileEncodingStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEncodingStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EncodingStore for FileEncodingStore {
    async fn insert(
        &self,
        doorbell_id: u32,
        label: &str,
        encoding: &FaceEncoding,
    ) -> Result<(), StoreError> {
        let record = EncodingRecord::new(doorbell_id, label, encoding.clone());
        let write_error = |details: String| StoreError::Write {
            label: label.to_string(),
            details,
        };

        let mut line = serde_json::to_string(&record).map_err(|e| write_error(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| write_error(e.to_string()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| write_error(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| write_error(e.to_string()))?;
        file.flush().await.map_err(|e| write_error(e.to_string()))?;

        debug!("Stored encoding {} for {}", record.id, label);
        Ok(())
    }

    async fn fetch_all(&self, doorbell_id: u32) -> Result<Vec<EncodingRecord>, StoreError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    details: format!("{}: {}", self.path.display(), e),
                })
            }
        };

        let mut records = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EncodingRecord>(line) {
                Ok(record) if record.doorbell_id == doorbell_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    "Skipping malformed encoding at {}:{}: {}",
                    self.path.display(),
                    number + 1,
                    e
                ),
            }
        }

        Ok(records)
    }
}
