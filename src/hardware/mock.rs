use super::transport::{SerialConnector, SerialTransport};
use crate::error::LinkError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared view of what a mock port has seen
#[derive(Clone, Default)]
pub struct MockWire {
    written: Arc<Mutex<Vec<u8>>>,
    incoming: Arc<Mutex<VecDeque<String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockWire {
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn push_line(&self, line: &str) {
        self.incoming.lock().push_back(line.to_string());
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

pub struct MockSerialTransport {
    name: String,
    wire: MockWire,
    open_handles: Arc<AtomicUsize>,
}

impl MockSerialTransport {
    fn new(name: &str, wire: MockWire, open_handles: Arc<AtomicUsize>) -> Self {
        open_handles.fetch_add(1, Ordering::SeqCst);
        Self {
            name: name.to_string(),
            wire,
            open_handles,
        }
    }
}

impl Drop for MockSerialTransport {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SerialTransport for MockSerialTransport {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        if *self.wire.fail_writes.lock() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.wire.written.lock().push(byte);
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.wire.incoming.lock().pop_front())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// Connector handing out mock ports that all share one wire.
///
/// Like a real port opened by `serialport`, the device is locked while a
/// handle is alive and a second open fails until it is dropped.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub wire: MockWire,
    connects: Arc<AtomicUsize>,
    open_handles: Arc<AtomicUsize>,
    missing: bool,
}

impl MockConnector {
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::default()
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

impl SerialConnector for MockConnector {
    fn connect(&self) -> Result<Box<dyn SerialTransport>, LinkError> {
        if self.missing {
            return Err(LinkError::DeviceNotFound {
                signatures: vec!["Arduino".to_string()],
            });
        }
        let n = self.connects.load(Ordering::SeqCst);
        let name = format!("/dev/ttyACM{}", n);
        if self.open_handles() > 0 {
            return Err(LinkError::Open {
                port: name,
                details: "Unable to acquire exclusive lock on serial port".to_string(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSerialTransport::new(
            &name,
            self.wire.clone(),
            Arc::clone(&self.open_handles),
        )))
    }
}
