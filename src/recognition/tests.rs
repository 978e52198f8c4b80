use super::mock::{encoding_for, mark_face, EngineProbe, MarkerFaceEngine};
use super::*;
use crate::error::RecognitionError;
use crate::store::EncodingRecord;
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;

fn record(label: &str, identity: u8, blocked: bool) -> EncodingRecord {
    let mut record = EncodingRecord::new(1, label, encoding_for(identity));
    record.blocked = blocked;
    record
}

#[tokio::test]
async fn test_detect_and_encode_returns_regions_with_encodings() {
    let gateway = RecognitionGateway::new(Box::new(MarkerFaceEngine::default()));

    let mut image = RgbImage::new(8, 8);
    mark_face(&mut image, 0, 0, 200);

    let faces = gateway.detect_and_encode(Arc::new(image)).await.unwrap();
    assert_eq!(faces.len(), 1);
    assert_eq!(faces[0].encoding, encoding_for(200));

    let empty = gateway
        .detect_and_encode(Arc::new(RgbImage::new(8, 8)))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_face_only_visible_at_180_degrees() {
    let probe = EngineProbe::default();
    let gateway = RecognitionGateway::new(Box::new(MarkerFaceEngine::with_probe(
        probe.clone(),
        Duration::ZERO,
    )));

    // Marker in the bottom-right corner only reaches (0, 0) after a half turn
    let mut image = RgbImage::new(6, 4);
    mark_face(&mut image, 5, 3, 42);

    let encodings = gateway.encode_any_orientation(Arc::new(image)).await.unwrap();

    assert_eq!(encodings, vec![encoding_for(42)]);
    // 0° and 90° failed, 180° succeeded, 270° never tried
    assert_eq!(probe.detect_calls(), 3);
}

#[tokio::test]
async fn test_upright_face_stops_at_first_orientation() {
    let probe = EngineProbe::default();
    let gateway = RecognitionGateway::new(Box::new(MarkerFaceEngine::with_probe(
        probe.clone(),
        Duration::ZERO,
    )));

    let mut image = RgbImage::new(6, 4);
    mark_face(&mut image, 0, 0, 7);

    let encodings = gateway.encode_any_orientation(Arc::new(image)).await.unwrap();
    assert_eq!(encodings.len(), 1);
    assert_eq!(probe.detect_calls(), 1);
}

#[tokio::test]
async fn test_no_face_in_any_orientation() {
    let probe = EngineProbe::default();
    let gateway = RecognitionGateway::new(Box::new(MarkerFaceEngine::with_probe(
        probe.clone(),
        Duration::ZERO,
    )));

    let encodings = gateway
        .encode_any_orientation(Arc::new(RgbImage::new(6, 4)))
        .await
        .unwrap();
    assert!(encodings.is_empty());
    assert_eq!(probe.detect_calls(), ORIENTATIONS.len());
}

#[tokio::test]
async fn test_engine_errors_are_propagated() {
    let gateway = RecognitionGateway::new(Box::new(MarkerFaceEngine::failing()));

    let result = gateway
        .encode_any_orientation(Arc::new(RgbImage::new(2, 2)))
        .await;
    assert!(matches!(result, Err(RecognitionError::Detection { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gateway_admits_one_caller_at_a_time() {
    let probe = EngineProbe::default();
    let gateway = RecognitionGateway::new(Box::new(MarkerFaceEngine::with_probe(
        probe.clone(),
        Duration::from_millis(5),
    )));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            let image = Arc::new(RgbImage::new(4, 4));
            gateway.encode_any_orientation(image).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(probe.detect_calls(), 8 * ORIENTATIONS.len());
    assert_eq!(probe.max_in_flight(), 1);
}

#[test]
fn test_euclidean_comparator() {
    let comparator = EuclideanComparator::default();
    let a = FaceEncoding(vec![0.0, 0.0]);
    let b = FaceEncoding(vec![0.3, 0.4]);
    let c = FaceEncoding(vec![0.6, 0.8]);

    assert!((comparator.distance(&a, &b) - 0.5).abs() < 1e-6);
    assert!(comparator.matches(&a, &b));
    assert!(!comparator.matches(&a, &c));
    assert_eq!(comparator.distance(&a, &FaceEncoding(vec![0.0])), f32::INFINITY);
}

#[test]
fn test_identify_picks_nearest_match() {
    let comparator = EuclideanComparator::default();
    let known = KnownFaceSet::new(vec![
        record("alice", 10, false),
        record("bob", 12, false),
        record("mallory", 200, true),
    ]);

    // Alice and bob are both within tolerance; the nearest one wins
    let identity = known.identify(&comparator, &encoding_for(12));
    assert_eq!(
        identity,
        Identity::Known {
            label: "bob".to_string(),
            blocked: false
        }
    );

    let identity = known.identify(&comparator, &encoding_for(201));
    assert_eq!(
        identity,
        Identity::Known {
            label: "mallory".to_string(),
            blocked: true
        }
    );
}

#[test]
fn test_identify_requires_predicate_agreement() {
    let comparator = EuclideanComparator::new(0.1);
    let known = KnownFaceSet::new(vec![record("alice", 0, false)]);

    // Nearest neighbour exists but is far outside tolerance
    let identity = known.identify(&comparator, &encoding_for(255));
    assert_eq!(identity, Identity::Unknown);
    assert_eq!(identity.label(), "Unknown");
}

#[test]
fn test_identify_with_no_known_faces() {
    let known = KnownFaceSet::default();
    assert!(known.is_empty());
    assert_eq!(
        known.identify(&EuclideanComparator::default(), &encoding_for(1)),
        Identity::Unknown
    );
}

#[test]
fn test_null_engine_detects_nothing() {
    let mut engine = NullFaceEngine::default();
    let image = RgbImage::new(4, 4);
    assert!(engine.detect(&image).unwrap().is_empty());
    assert!(engine.encode(&image, &[]).unwrap().is_empty());
}
