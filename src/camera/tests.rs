use super::mock::ScriptedFrameSource;
use super::*;
use crate::config::{CameraConfig, KnocklyConfig};
use crate::error::CameraError;
use crate::frame::FrameData;
use image::RgbImage;
use std::time::SystemTime;

fn create_test_camera_config() -> CameraConfig {
    let mut config = KnocklyConfig::default().camera;
    config.resolution = (64, 48);
    config.fps = 30;
    config
}

#[tokio::test]
async fn test_capture_requires_start() {
    // Pipeline creation fails without camera plugins, which is expected in CI
    match CameraInterface::new(create_test_camera_config()).await {
        Ok(camera) => {
            assert!(!camera.is_running());
            assert_eq!(camera.frame_count(), 0);
            assert!(matches!(camera.capture().await, Err(CameraError::NotRunning)));
            camera.stop().await.unwrap();
        }
        Err(CameraError::Configuration { .. }) => {
            println!("Camera plugins not available - test passed");
        }
        Err(e) => panic!("Unexpected error creating camera interface: {}", e),
    }
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
#[tokio::test]
async fn test_synthetic_frames_without_camera_backend() {
    let camera = CameraInterface::new(create_test_camera_config())
        .await
        .unwrap();
    camera.start().await.unwrap();

    let first = camera.capture().await.unwrap();
    let second = camera.capture().await.unwrap();
    assert_eq!((first.width(), first.height()), (64, 48));
    assert!(second.id > first.id);

    camera.stop().await.unwrap();
    assert!(!camera.is_running());
}

#[cfg(all(feature = "camera", target_os = "linux"))]
#[test]
fn test_pipeline_string_applies_rotation() {
    use super::interface::build_pipeline_string;
    use crate::frame::Rotation;

    let mut config = create_test_camera_config();
    let description = build_pipeline_string(&config).unwrap();
    assert!(description.starts_with("libcamerasrc"));
    assert!(description.contains("width=64,height=48,framerate=30/1"));
    assert!(description.contains("videoflip method=rotate-180"));
    assert!(description.contains("format=RGB"));

    config.source = "v4l2".to_string();
    config.rotation = Some(Rotation::Rotate90);
    let description = build_pipeline_string(&config).unwrap();
    assert!(description.starts_with("v4l2src device=/dev/video0"));
    assert!(description.contains("method=clockwise"));

    config.rotation = None;
    assert!(!build_pipeline_string(&config).unwrap().contains("videoflip"));

    config.source = "firewire".to_string();
    assert!(matches!(
        build_pipeline_string(&config),
        Err(CameraError::Configuration { .. })
    ));
}

#[tokio::test]
async fn test_scripted_source_replays_in_order() {
    let source = ScriptedFrameSource::new(vec![
        Ok(FrameData::new(1, SystemTime::now(), RgbImage::new(2, 2))),
        Err(CameraError::Capture {
            details: "glitch".to_string(),
        }),
    ]);
    source.start().await.unwrap();

    assert_eq!(source.capture().await.unwrap().id, 1);
    assert!(source.capture().await.is_err());
    assert!(source.capture().await.is_err());
    assert_eq!(source.remaining(), 0);
}
