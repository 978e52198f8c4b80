use super::FrameSource;
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Frame source replaying a fixed script of frames and failures
#[derive(Default)]
pub struct ScriptedFrameSource {
    script: Mutex<VecDeque<Result<FrameData, CameraError>>>,
    running: AtomicBool,
}

impl ScriptedFrameSource {
    pub fn new(script: Vec<Result<FrameData, CameraError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            running: AtomicBool::new(false),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl FrameSource for ScriptedFrameSource {
    async fn start(&self) -> Result<(), CameraError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn capture(&self) -> Result<FrameData, CameraError> {
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(CameraError::Capture {
                    details: "script exhausted".to_string(),
                })
            }
        }
    }

    async fn stop(&self) -> Result<(), CameraError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
