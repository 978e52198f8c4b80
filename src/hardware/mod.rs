mod command;
mod link;
#[cfg(test)]
pub(crate) mod mock;
mod transport;

pub use command::HardwareCommand;
pub use link::{HardwareLink, DOORBELL_SENTINEL};
pub use transport::{select_port, PortCandidate, SerialConnector, SerialTransport, SerialportConnector};
