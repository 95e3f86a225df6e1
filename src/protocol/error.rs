use std::error::Error;
use std::fmt;

/// Why an incoming frame was not turned into a command.
///
/// Every variant is dropped silently by the router; MIDI lines carry other
/// devices' traffic, so none of these indicate a fault on our side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame shorter than the command requires
    Truncated { expected: usize, actual: usize },
    /// Missing F0/F7 or wrong sub-id
    BadFraming,
    /// Manufacturer byte is neither ours nor universal real-time
    UnknownVendor(u8),
    /// Command byte is not part of the dialect
    UnknownCommand(u8),
    /// Payload does not match the command's layout
    InvalidPayload(&'static str),
    /// Well-formed, but addressed to another device
    AddressMismatch { target: u8, local: u8 },
}

impl ProtocolError {
    pub fn is_address_mismatch(&self) -> bool {
        matches!(self, ProtocolError::AddressMismatch { .. })
    }

    pub fn is_malformed(&self) -> bool {
        !self.is_address_mismatch()
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Truncated { expected, actual } => {
                write!(f, "frame too short: need {} bytes, got {}", expected, actual)
            }
            ProtocolError::BadFraming => write!(f, "bad frame delimiters"),
            ProtocolError::UnknownVendor(id) => write!(f, "unknown vendor id {:#04X}", id),
            ProtocolError::UnknownCommand(cmd) => write!(f, "unknown command {:#04X}", cmd),
            ProtocolError::InvalidPayload(why) => write!(f, "invalid payload: {}", why),
            ProtocolError::AddressMismatch { target, local } => write!(
                f,
                "addressed to device {}, local device is {}",
                target, local
            ),
        }
    }
}

impl Error for ProtocolError {}
