//! Control protocols carried over SysEx.
//!
//! Two dialects share one decoder entry point:
//! - the vendor dialect (`F0 7D <device> <command> [payload] F7`) for remote
//!   control and full player-state mirroring between instances
//! - the MIDI Machine Control subset (`F0 7F <device> 06 <command> [data] F7`)
//!   for tape-style transport and locate
//!
//! Decoding yields a tagged command value; nothing is dispatched through
//! global callbacks. Each [`ProtocolContext`] carries its own device id, so
//! several independent instances can coexist in one process.
mod error;
pub mod mmc;
pub mod snapshot;
pub mod sysex;

pub use error::ProtocolError;
pub use mmc::{LocateType, MmcCommand, MmcMessage, MmcPosition};
pub use snapshot::{PlayerStateHeader, PlayerStateSnapshot};
pub use sysex::{LoopRange, SysExCommand, SysExMessage};

use crate::midi::engine::{SYSEX_END, SYSEX_START};

/// Manufacturer id of the vendor dialect (non-commercial range).
pub const VENDOR_ID: u8 = 0x7D;

/// Universal real-time SysEx id, used by MMC.
pub const UNIVERSAL_REALTIME: u8 = 0x7F;

/// Device id every participant accepts.
pub const BROADCAST: u8 = 0x7F;

/// A protocol participant address, 0-127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u8);

impl DeviceId {
    pub const BROADCAST: DeviceId = DeviceId(BROADCAST);

    pub fn new(id: u8) -> Option<Self> {
        (id <= 0x7F).then_some(DeviceId(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_broadcast(self) -> bool {
        self.0 == BROADCAST
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId(0)
    }
}

/// A decoded control frame from either dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    SysEx(SysExMessage),
    Mmc(MmcMessage),
}

/// Per-instance protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolContext {
    device_id: DeviceId,
}

impl ProtocolContext {
    pub fn new(device_id: DeviceId) -> Self {
        Self { device_id }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn set_device_id(&mut self, device_id: DeviceId) {
        self.device_id = device_id;
    }

    /// Accepts frames addressed to us or to everyone.
    pub fn accepts(&self, target: u8) -> bool {
        target == self.device_id.get() || target == BROADCAST
    }

    pub(crate) fn check_address(&self, target: u8) -> Result<(), ProtocolError> {
        if self.accepts(target) {
            Ok(())
        } else {
            Err(ProtocolError::AddressMismatch {
                target,
                local: self.device_id.get(),
            })
        }
    }

    /// Routes a complete SysEx frame to the matching dialect.
    pub fn decode(&self, bytes: &[u8]) -> Result<Incoming, ProtocolError> {
        match bytes.get(1) {
            Some(&VENDOR_ID) => self.decode_sysex(bytes).map(Incoming::SysEx),
            Some(&UNIVERSAL_REALTIME) => self.decode_mmc(bytes).map(Incoming::Mmc),
            Some(&other) if bytes[0] == SYSEX_START => Err(ProtocolError::UnknownVendor(other)),
            Some(_) => Err(ProtocolError::BadFraming),
            None => Err(ProtocolError::Truncated {
                expected: sysex::MIN_FRAME_LEN,
                actual: bytes.len(),
            }),
        }
    }

    pub fn decode_sysex(&self, bytes: &[u8]) -> Result<SysExMessage, ProtocolError> {
        sysex::decode(self, bytes)
    }

    pub fn decode_mmc(&self, bytes: &[u8]) -> Result<MmcMessage, ProtocolError> {
        mmc::decode(self, bytes)
    }
}

/// Splits a 14-bit value into two data bytes, LSB first.
pub fn split_u14(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

pub fn join_u14(lsb: u8, msb: u8) -> u16 {
    u16::from(lsb & 0x7F) | (u16::from(msb & 0x7F) << 7)
}

pub fn is_data_byte(byte: u8) -> bool {
    byte & 0x80 == 0
}

/// Checks start/end delimiters and the minimum length.
pub(crate) fn check_frame(bytes: &[u8], min_len: usize) -> Result<(), ProtocolError> {
    if bytes.len() < min_len {
        return Err(ProtocolError::Truncated {
            expected: min_len,
            actual: bytes.len(),
        });
    }
    if bytes[0] != SYSEX_START || bytes[bytes.len() - 1] != SYSEX_END {
        return Err(ProtocolError::BadFraming);
    }
    Ok(())
}

/// Writes `F0 <header...> <parts...> F7` into `dest`. Returns the frame
/// length, or 0 when `dest` cannot hold it.
pub(crate) fn write_frame(dest: &mut [u8], header: &[u8], parts: &[&[u8]]) -> usize {
    let len = 2 + header.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    if dest.len() < len {
        return 0;
    }

    dest[0] = SYSEX_START;
    let mut at = 1;
    for chunk in std::iter::once(header).chain(parts.iter().copied()) {
        dest[at..at + chunk.len()].copy_from_slice(chunk);
        at += chunk.len();
    }
    dest[at] = SYSEX_END;
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_range() {
        assert!(DeviceId::new(0).is_some());
        assert!(DeviceId::new(127).is_some_and(|id| id.is_broadcast()));
        assert!(DeviceId::new(128).is_none());
    }

    #[test]
    fn test_u14_split_is_lsb_first() {
        assert_eq!(split_u14(138), [0x0A, 0x01]);
        assert_eq!(join_u14(0x0A, 0x01), 138);
        assert_eq!(split_u14(0x3FFF), [0x7F, 0x7F]);
    }

    #[test]
    fn test_write_frame_rejects_short_buffer() {
        let mut buf = [0u8; 4];
        assert_eq!(write_frame(&mut buf, &[0x7D, 0x00, 0x20], &[]), 0);
        let mut buf = [0u8; 5];
        assert_eq!(write_frame(&mut buf, &[0x7D, 0x00, 0x20], &[]), 5);
        assert_eq!(buf, [0xF0, 0x7D, 0x00, 0x20, 0xF7]);
    }

    #[test]
    fn test_unknown_vendor() {
        let ctx = ProtocolContext::default();
        assert_eq!(
            ctx.decode(&[0xF0, 0x41, 0x00, 0x20, 0xF7]),
            Err(ProtocolError::UnknownVendor(0x41))
        );
    }
}
