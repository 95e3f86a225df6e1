use std::error::Error;
use std::fmt;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const SONG_POSITION: u8 = 0xF2;
pub const TIMING_CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Custom error type for MIDI operations
#[derive(Debug)]
pub enum MidiError {
    /// Error when sending a MIDI message
    SendError(String),
    /// Error when receiving a MIDI message
    RecvError(String),
    /// Error when connecting to a MIDI device
    ConnectionError(String),
    /// No output device is attached
    DeviceUnavailable,
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiError::SendError(msg) => write!(f, "MIDI send error: {}", msg),
            MidiError::RecvError(msg) => write!(f, "MIDI receive error: {}", msg),
            MidiError::ConnectionError(msg) => write!(f, "MIDI connection error: {}", msg),
            MidiError::DeviceUnavailable => write!(f, "MIDI device unavailable"),
        }
    }
}

impl Error for MidiError {}

impl From<midir::InitError> for MidiError {
    fn from(e: midir::InitError) -> Self {
        MidiError::ConnectionError(e.to_string())
    }
}

impl From<midir::PortInfoError> for MidiError {
    fn from(e: midir::PortInfoError) -> Self {
        MidiError::ConnectionError(e.to_string())
    }
}

impl<T> From<midir::ConnectError<T>> for MidiError {
    fn from(e: midir::ConnectError<T>) -> Self {
        MidiError::ConnectionError(e.to_string())
    }
}

impl From<midir::SendError> for MidiError {
    fn from(e: midir::SendError) -> Self {
        MidiError::SendError(e.to_string())
    }
}

impl From<crossbeam::channel::RecvError> for MidiError {
    fn from(e: crossbeam::channel::RecvError) -> Self {
        MidiError::RecvError(e.to_string())
    }
}

/// Represents a MIDI message that can be sent or received
#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    /// Note On message with note number and velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off message with note number and velocity
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Control Change message with controller number and value
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Program Change message with program number
    ProgramChange { channel: u8, program: u8 },
    /// Song Position Pointer in MIDI beats (16th notes)
    SongPosition(u16),
    /// MIDI Clock timing message
    Clock,
    /// MIDI Start message
    Start,
    /// MIDI Stop message
    Stop,
    /// MIDI Continue message
    Continue,
    /// Complete System Exclusive frame, including F0 and F7
    SysEx(Vec<u8>),
}

impl MidiMessage {
    /// Hands the wire bytes of this message to `f` without allocating.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let short: [u8; 3] = match self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => [NOTE_ON | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => [NOTE_OFF | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => [
                CONTROL_CHANGE | (channel & 0x0F),
                controller & 0x7F,
                value & 0x7F,
            ],
            MidiMessage::ProgramChange { channel, program } => {
                return f(&[PROGRAM_CHANGE | (channel & 0x0F), program & 0x7F][..])
            }
            MidiMessage::SongPosition(beats) => [
                SONG_POSITION,
                (beats & 0x7F) as u8,
                ((beats >> 7) & 0x7F) as u8,
            ],
            MidiMessage::Clock => return f(&[TIMING_CLOCK][..]),
            MidiMessage::Start => return f(&[START][..]),
            MidiMessage::Stop => return f(&[STOP][..]),
            MidiMessage::Continue => return f(&[CONTINUE][..]),
            MidiMessage::SysEx(bytes) => return f(bytes.as_slice()),
        };
        f(&short[..])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.with_bytes(|bytes| bytes.to_vec())
    }

    /// Parses one complete MIDI packet as delivered by the input driver.
    pub fn parse(data: &[u8]) -> Option<MidiMessage> {
        let status = *data.first()?;
        match status {
            SYSEX_START if data.last() == Some(&SYSEX_END) && data.len() >= 2 => {
                return Some(MidiMessage::SysEx(data.to_vec()))
            }
            SONG_POSITION if data.len() >= 3 => {
                let beats = u16::from(data[1] & 0x7F) | (u16::from(data[2] & 0x7F) << 7);
                return Some(MidiMessage::SongPosition(beats));
            }
            TIMING_CLOCK => return Some(MidiMessage::Clock),
            START => return Some(MidiMessage::Start),
            STOP => return Some(MidiMessage::Stop),
            CONTINUE => return Some(MidiMessage::Continue),
            _ => {}
        }

        match status & 0xF0 {
            NOTE_ON if data.len() >= 3 => Some(MidiMessage::NoteOn {
                channel: status & 0x0F,
                note: data[1],
                velocity: data[2],
            }),
            NOTE_OFF if data.len() >= 3 => Some(MidiMessage::NoteOff {
                channel: status & 0x0F,
                note: data[1],
                velocity: data[2],
            }),
            CONTROL_CHANGE if data.len() >= 3 => Some(MidiMessage::ControlChange {
                channel: status & 0x0F,
                controller: data[1],
                value: data[2],
            }),
            PROGRAM_CHANGE if data.len() >= 2 => Some(MidiMessage::ProgramChange {
                channel: status & 0x0F,
                program: data[1],
            }),
            _ => None,
        }
    }
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// Trait defining the interface for MIDI engine implementations
pub trait MidiEngine: Send {
    /// Sends a MIDI message to the device
    fn send(&mut self, msg: MidiMessage) -> Result<()>;

    /// Receives one raw MIDI packet from the device
    fn recv(&mut self) -> Result<Vec<u8>>;

    /// Lists the port names this backend can see
    fn list_devices(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_position_bytes_are_lsb_first() {
        let bytes = MidiMessage::SongPosition(0x0281).to_bytes();
        assert_eq!(bytes, vec![0xF2, 0x01, 0x05]);
        assert_eq!(
            MidiMessage::parse(&bytes),
            Some(MidiMessage::SongPosition(0x0281))
        );
    }

    #[test]
    fn test_channel_is_masked() {
        let bytes = MidiMessage::ProgramChange {
            channel: 0x12,
            program: 5,
        }
        .to_bytes();
        assert_eq!(bytes, vec![0xC2, 5]);
    }
}
