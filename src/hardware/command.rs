use crate::error::MailboxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Single-byte commands understood by the door microcontroller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareCommand {
    /// '0' - reset after the daemon starts
    Reset,
    /// '1' - unlock requested by the phone
    RequestOpen,
    /// '2' - lock requested by the phone
    RequestClose,
    /// '3' - an allowed face was recognized
    FaceAllowed,
    /// '4' - a blocked face was recognized
    FaceBlocked,
}

impl HardwareCommand {
    pub const ALL: [HardwareCommand; 5] = [
        HardwareCommand::Reset,
        HardwareCommand::RequestOpen,
        HardwareCommand::RequestClose,
        HardwareCommand::FaceAllowed,
        HardwareCommand::FaceBlocked,
    ];

    /// The ASCII byte written to the wire
    pub fn wire_byte(&self) -> u8 {
        match self {
            HardwareCommand::Reset => b'0',
            HardwareCommand::RequestOpen => b'1',
            HardwareCommand::RequestClose => b'2',
            HardwareCommand::FaceAllowed => b'3',
            HardwareCommand::FaceBlocked => b'4',
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.wire_byte() == byte)
    }

    /// Log line written after the command goes out
    pub fn description(&self) -> &'static str {
        match self {
            HardwareCommand::Reset => "Controller startup reset.",
            HardwareCommand::RequestOpen => "Phone has requested to open the door.",
            HardwareCommand::RequestClose => "Phone has requested to close the door.",
            HardwareCommand::FaceAllowed => "Known face detected.",
            HardwareCommand::FaceBlocked => "Blocked face detected.",
        }
    }
}

impl fmt::Display for HardwareCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_byte() as char)
    }
}

impl FromStr for HardwareCommand {
    type Err = MailboxError;

    /// Parses the trimmed mailbox content; exactly one wire character is accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.as_bytes() {
            [byte] => Self::from_wire_byte(*byte).ok_or_else(|| MailboxError::Parse {
                content: trimmed.to_string(),
            }),
            _ => Err(MailboxError::Parse {
                content: trimmed.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_encoding() {
        let bytes: Vec<u8> = HardwareCommand::ALL.iter().map(|c| c.wire_byte()).collect();
        assert_eq!(bytes, b"01234".to_vec());

        for command in HardwareCommand::ALL {
            assert_eq!(HardwareCommand::from_wire_byte(command.wire_byte()), Some(command));
        }
        assert_eq!(HardwareCommand::from_wire_byte(b'5'), None);
    }

    #[test]
    fn test_parse_mailbox_content() {
        assert_eq!("1".parse::<HardwareCommand>().unwrap(), HardwareCommand::RequestOpen);
        assert_eq!(" 2\n".parse::<HardwareCommand>().unwrap(), HardwareCommand::RequestClose);

        assert!("".parse::<HardwareCommand>().is_err());
        assert!("open".parse::<HardwareCommand>().is_err());
        assert!("12".parse::<HardwareCommand>().is_err());
        assert!("9".parse::<HardwareCommand>().is_err());
    }
}
