use super::*;
use crate::error::StoreError;
use tempfile::TempDir;

fn encoding(value: f32) -> FaceEncoding {
    FaceEncoding(vec![value; 4])
}

#[tokio::test]
async fn test_file_store_appends_and_filters_by_doorbell() {
    let dir = TempDir::new().unwrap();
    let store = FileEncodingStore::new(dir.path().join("nested").join("faces.jsonl"));

    store.insert(1, "alice", &encoding(0.1)).await.unwrap();
    store.insert(2, "bob", &encoding(0.2)).await.unwrap();
    store.insert(1, "carol", &encoding(0.3)).await.unwrap();

    let records = store.fetch_all(1).await.unwrap();
    let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["alice", "carol"]);
    assert_eq!(records[1].encoding, encoding(0.3));
    assert!(!records[0].blocked);

    assert_eq!(store.fetch_all(2).await.unwrap().len(), 1);
    assert!(store.fetch_all(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_store_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileEncodingStore::new(dir.path().join("absent.jsonl"));
    assert!(store.fetch_all(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_store_skips_malformed_lines_and_reads_blocked_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("faces.jsonl");

    let mut blocked = EncodingRecord::new(1, "mallory", encoding(0.9));
    blocked.blocked = true;
    let contents = format!(
        "{}\nnot json at all\n\n",
        serde_json::to_string(&blocked).unwrap()
    );
    std::fs::write(&path, contents).unwrap();

    let store = FileEncodingStore::new(&path);
    store.insert(1, "alice", &encoding(0.1)).await.unwrap();

    let records = store.fetch_all(1).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].blocked);
    assert_eq!(records[1].label, "alice");
}

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryEncodingStore::new();
    store.insert(5, "front", &encoding(0.5)).await.unwrap();
    store.insert(6, "side", &encoding(0.6)).await.unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.fetch_all(5).await.unwrap()[0].label, "front");

    let read_only = MemoryEncodingStore::read_only();
    let result = read_only.insert(5, "front", &encoding(0.5)).await;
    assert!(matches!(result, Err(StoreError::Write { .. })));
    assert!(read_only.is_empty());
}
