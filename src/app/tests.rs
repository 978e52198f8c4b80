use super::*;
use crate::camera::mock::ScriptedFrameSource;
use crate::camera::FrameSource;
use crate::config::KnocklyConfig;
use crate::enrollment::mock::ScriptedVideoDecoder;
use crate::events::KnocklyEvent;
use crate::frame::FrameData;
use crate::hardware::mock::MockConnector;
use crate::hardware::HardwareCommand;
use crate::mailbox::{Mailbox, MemoryMailbox};
use crate::notify::mock::RecordingNotifier;
use crate::recognition::mock::{encoding_for, mark_face, MarkerFaceEngine};
use crate::recognition::EuclideanComparator;
use crate::store::{EncodingRecord, MemoryEncodingStore};
use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const ALICE: u8 = 10;

struct Fixture {
    _dir: TempDir,
    connector: MockConnector,
    camera: Arc<ScriptedFrameSource>,
    mailbox: Arc<MemoryMailbox>,
    orchestrator: KnocklyOrchestrator,
}

fn test_config(dir: &TempDir) -> KnocklyConfig {
    let mut config = KnocklyConfig::default();
    config.serial.settle_ms = 0;
    config.serial.reset_settle_ms = 0;
    config.recognition.downscale = 1;
    config.recognition.idle_sleep_ms = 1;
    config.enrollment.ingest_dir = dir.path().join("ingest");
    config.enrollment.processed_dir = dir.path().join("processed");
    config.enrollment.stability_window_ms = 10;
    config.mailbox.poll_interval_ms = 10;
    config.upload.enabled = false;
    config
}

fn frame_with_face(identity: u8) -> FrameData {
    let mut image = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
    mark_face(&mut image, 0, 0, identity);
    FrameData::new(0, SystemTime::now(), image)
}

fn fixture_with(connector: MockConnector, frames: Vec<FrameData>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let camera = Arc::new(ScriptedFrameSource::new(frames.into_iter().map(Ok).collect()));
    let mailbox = Arc::new(MemoryMailbox::new());

    let components = Components {
        camera: camera.clone(),
        connector: Arc::new(connector.clone()),
        engine: Box::new(MarkerFaceEngine::default()),
        comparator: Arc::new(EuclideanComparator::default()),
        store: Arc::new(MemoryEncodingStore::with_records(vec![EncodingRecord::new(
            1,
            "alice",
            encoding_for(ALICE),
        )])),
        decoder: Arc::new(ScriptedVideoDecoder),
        mailbox: mailbox.clone(),
        notifier: Arc::new(RecordingNotifier::default()),
    };

    Fixture {
        _dir: dir,
        connector,
        camera,
        mailbox,
        orchestrator: KnocklyOrchestrator::new(config, components),
    }
}

fn fixture(frames: Vec<FrameData>) -> Fixture {
    fixture_with(MockConnector::default(), frames)
}

/// Run the orchestrator and request a keyboard-style shutdown after `delay`
async fn run_for(orchestrator: &mut KnocklyOrchestrator, delay: Duration) -> i32 {
    let event_bus = orchestrator.event_bus();
    let (exit_code, _) = tokio::join!(orchestrator.run(), async move {
        tokio::time::sleep(delay).await;
        event_bus.publish(KnocklyEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "test".to_string(),
        });
    });
    exit_code.unwrap()
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let mut f = fixture(Vec::new());
    f.orchestrator.initialize().await.unwrap();

    let states = f.orchestrator.get_all_component_states().await;
    for component in ["camera", "link", "enrollment", "mailbox", "live"] {
        assert_eq!(states.get(component), Some(&ComponentState::Stopped));
    }
    assert!(!states.contains_key("upload"));
    assert!(!states.contains_key("keyboard"));
}

#[tokio::test]
async fn test_start_resets_microcontroller_and_reopens_port() {
    let mut f = fixture(Vec::new());
    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.start().await.unwrap();

    assert!(f.camera.is_running());
    assert_eq!(f.connector.wire.written(), b"0".to_vec());
    assert_eq!(f.connector.connect_count(), 2);
    assert_eq!(f.connector.open_handles(), 1);
    assert!(f.orchestrator.link().is_some());
    assert_eq!(
        f.orchestrator.get_component_state("link").await,
        Some(ComponentState::Running)
    );

    assert_eq!(f.orchestrator.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_device_is_fatal() {
    let mut f = fixture_with(MockConnector::missing(), Vec::new());
    f.orchestrator.initialize().await.unwrap();

    let err = f.orchestrator.start().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(
        f.orchestrator.get_component_state("link").await,
        Some(ComponentState::Failed)
    );
    assert!(f.orchestrator.link().is_none());
}

#[tokio::test]
async fn test_run_requires_start() {
    let mut f = fixture(Vec::new());
    assert!(f.orchestrator.run().await.is_err());
}

#[tokio::test]
async fn test_run_recognizes_face_then_shuts_down_cleanly() {
    let mut f = fixture(vec![frame_with_face(ALICE)]);
    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.start().await.unwrap();

    let exit_code = run_for(&mut f.orchestrator, Duration::from_millis(300)).await;

    assert_eq!(exit_code, 0);
    assert_eq!(f.connector.wire.written(), b"03".to_vec());
    assert!(!f.camera.is_running());
    assert_eq!(f.camera.remaining(), 0);

    let states = f.orchestrator.get_all_component_states().await;
    for component in ["camera", "enrollment", "mailbox", "live"] {
        assert_eq!(states.get(component), Some(&ComponentState::Stopped), "{}", component);
    }
    assert!(f.orchestrator.failed_components().await.is_empty());
}

#[tokio::test]
async fn test_mailbox_commands_reach_the_wire_while_running() {
    let mut f = fixture(Vec::new());
    f.orchestrator.initialize().await.unwrap();
    f.orchestrator.start().await.unwrap();

    f.mailbox.post(HardwareCommand::RequestOpen).await.unwrap();

    let exit_code = run_for(&mut f.orchestrator, Duration::from_millis(200)).await;

    assert_eq!(exit_code, 0);
    assert_eq!(f.connector.wire.written(), b"01".to_vec());
    assert!(f.mailbox.is_empty());
}

#[tokio::test]
async fn test_component_state_management() {
    let f = fixture(Vec::new());

    f.orchestrator
        .set_component_state("camera", ComponentState::Starting)
        .await;
    assert_eq!(
        f.orchestrator.get_component_state("camera").await,
        Some(ComponentState::Starting)
    );

    f.orchestrator
        .set_component_state("upload", ComponentState::Failed)
        .await;
    f.orchestrator
        .set_component_state("enrollment", ComponentState::Failed)
        .await;
    f.orchestrator
        .set_component_state("mailbox", ComponentState::Running)
        .await;

    assert_eq!(f.orchestrator.get_all_component_states().await.len(), 4);
    assert_eq!(
        f.orchestrator.failed_components().await,
        vec!["enrollment".to_string(), "upload".to_string()]
    );
}
