use crate::config::SerialConfig;
use crate::error::LinkError;
use std::io;

/// Byte-level access to the microcontroller
pub trait SerialTransport: Send {
    /// Write one command byte
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Read one newline-terminated line, waiting at most the port timeout.
    /// Returns `Ok(None)` when no complete line arrived in time.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Name of the underlying device, for logging
    fn port_name(&self) -> &str;
}

/// Placeholder held while the real port is closed for rediscovery
pub(crate) struct ClosedTransport {
    name: String,
}

impl ClosedTransport {
    pub(crate) fn new(name: String) -> Self {
        Self { name }
    }

    fn not_connected(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotConnected,
            format!("{} is closed", self.name),
        )
    }
}

impl SerialTransport for ClosedTransport {
    fn write_byte(&mut self, _byte: u8) -> io::Result<()> {
        Err(self.not_connected())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        Err(self.not_connected())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// Discovers and opens the microcontroller port
pub trait SerialConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn SerialTransport>, LinkError>;
}

/// A serial device seen during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub name: String,
    pub description: Option<String>,
}

/// Pick the first candidate whose name or description contains a signature
pub fn select_port(candidates: &[PortCandidate], signatures: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|candidate| {
            signatures.iter().any(|signature| {
                candidate.name.contains(signature.as_str())
                    || candidate
                        .description
                        .as_deref()
                        .map(|d| d.contains(signature.as_str()))
                        .unwrap_or(false)
            })
        })
        .map(|candidate| candidate.name.clone())
}

/// Longest partial line kept before it is flushed as a line of its own
const MAX_PENDING_BYTES: usize = 1024;

/// Split the first complete line off the pending buffer
pub(crate) fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = match pending.iter().position(|b| *b == b'\n') {
        Some(pos) => pos + 1,
        None if pending.len() >= MAX_PENDING_BYTES => pending.len(),
        None => return None,
    };
    let line: Vec<u8> = pending.drain(..end).collect();
    Some(String::from_utf8_lossy(&line).trim().to_string())
}

/// Connector backed by the `serialport` crate
pub struct SerialportConnector {
    config: SerialConfig,
}

impl SerialportConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

#[cfg(feature = "serial")]
mod native {
    use super::*;
    use serialport::{SerialPort, SerialPortType};
    use std::io::{Read, Write};
    use tracing::{debug, info};

    pub struct SerialportTransport {
        port: Box<dyn SerialPort>,
        name: String,
        pending: Vec<u8>,
    }

    impl SerialTransport for SerialportTransport {
        fn write_byte(&mut self, byte: u8) -> io::Result<()> {
            self.port.write_all(&[byte])?;
            self.port.flush()
        }

        fn read_line(&mut self) -> io::Result<Option<String>> {
            let mut buf = [0u8; 64];
            loop {
                if let Some(line) = take_line(&mut self.pending) {
                    return Ok(Some(line));
                }
                match self.port.read(&mut buf) {
                    Ok(0) => return Ok(None),
                    Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(None),
                    Err(e) => return Err(e),
                }
            }
        }

        fn port_name(&self) -> &str {
            &self.name
        }
    }

    pub fn list_candidates() -> Result<Vec<PortCandidate>, LinkError> {
        let ports = serialport::available_ports().map_err(|e| LinkError::HardwareIo {
            operation: "port discovery",
            source: io::Error::new(io::ErrorKind::Other, e.to_string()),
        })?;

        Ok(ports
            .into_iter()
            .map(|port| {
                let description = match port.port_type {
                    SerialPortType::UsbPort(usb) => {
                        let parts: Vec<String> =
                            [usb.manufacturer, usb.product].into_iter().flatten().collect();
                        (!parts.is_empty()).then(|| parts.join(" "))
                    }
                    _ => None,
                };
                PortCandidate {
                    name: port.port_name,
                    description,
                }
            })
            .collect())
    }

    impl SerialConnector for SerialportConnector {
        fn connect(&self) -> Result<Box<dyn SerialTransport>, LinkError> {
            let candidates = list_candidates()?;
            debug!("Serial candidates: {:?}", candidates);

            let name = select_port(&candidates, &self.config.signatures).ok_or_else(|| {
                LinkError::DeviceNotFound {
                    signatures: self.config.signatures.clone(),
                }
            })?;

            let port = serialport::new(&name, self.config.baud_rate)
                .timeout(self.config.read_timeout())
                .open()
                .map_err(|e| LinkError::Open {
                    port: name.clone(),
                    details: e.to_string(),
                })?;

            info!(
                "Opened microcontroller port {} at {} baud",
                name, self.config.baud_rate
            );

            Ok(Box::new(SerialportTransport {
                port,
                name,
                pending: Vec::new(),
            }))
        }
    }
}

#[cfg(not(feature = "serial"))]
impl SerialConnector for SerialportConnector {
    fn connect(&self) -> Result<Box<dyn SerialTransport>, LinkError> {
        tracing::warn!("Serial feature is disabled, no microcontroller link available");
        Err(LinkError::DeviceNotFound {
            signatures: self.config.signatures.clone(),
        })
    }
}
