//! Player-state snapshot carried by the state-sync response.
//!
//! Layout after the command byte: a 15-byte header, then `ceil(n / 8)` bytes
//! of mute bits (channel `i` is bit `i % 8` of byte `i / 8`), then `n`
//! volume bytes, then `n` pan bytes. `n` is the header's channel count.
//!
//! Mute bytes are raw bit vectors and may have bit 7 set, so a receiver must
//! locate the frame end by the computed length rather than by scanning for
//! F7.

use super::sysex::FRAME_OVERHEAD;
use super::{join_u14, split_u14, ProtocolError};

pub const HEADER_LEN: usize = 15;
pub const MIN_CHANNELS: usize = 1;
pub const MAX_CHANNELS: usize = 127;
pub const MAX_TEMPO: u16 = 0x3FFF;

const CHANNEL_COUNT_OFFSET: usize = 5;

pub mod playback_flags {
    pub const PLAYING: u8 = 0x01;
    pub const PAUSED: u8 = 0x02;
    pub const LOOPING: u8 = 0x04;
    pub const PATTERN_LOOP: u8 = 0x08;
}

pub mod mixer_flags {
    pub const INPUT_ENABLED: u8 = 0x01;
    pub const EFFECTS_ENABLED: u8 = 0x02;
    pub const INPUT_MONITOR: u8 = 0x04;
}

pub fn valid_channel_count(channels: usize) -> bool {
    (MIN_CHANNELS..=MAX_CHANNELS).contains(&channels)
}

pub fn mute_bytes(channels: usize) -> usize {
    channels.div_ceil(8)
}

/// Full SysEx frame length for `channels` channels.
pub fn frame_len(channels: usize) -> usize {
    FRAME_OVERHEAD + HEADER_LEN + mute_bytes(channels) + 2 * channels
}

/// Packs one flag per channel into bytes, LSB first.
pub fn pack_mute_bits(muted: &[bool]) -> Vec<u8> {
    let mut bits = vec![0u8; mute_bytes(muted.len())];
    for (channel, _) in muted.iter().enumerate().filter(|(_, m)| **m) {
        bits[channel / 8] |= 1 << (channel % 8);
    }
    bits
}

/// Scalar fields of the snapshot. The channel count is not stored here;
/// it follows from the per-channel arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerStateHeader {
    pub playback_flags: u8,
    pub order: u8,
    pub row: u8,
    pub pattern: u8,
    pub total_rows: u8,
    pub master_volume: u8,
    pub mixer_flags: u8,
    pub input_volume: u8,
    pub effects_routing: u8,
    pub stereo_separation: u8,
    pub tempo: u16,
    pub master_pan: u8,
    pub input_pan: u8,
}

impl PlayerStateHeader {
    /// Serializes the header. Fields wider than a data byte are clamped to
    /// 127 and the tempo to 14 bits.
    pub fn to_bytes(&self, channel_count: u8) -> [u8; HEADER_LEN] {
        let clamp = |v: u8| v.min(0x7F);
        let [tempo_lsb, tempo_msb] = split_u14(self.tempo.min(MAX_TEMPO));
        [
            clamp(self.playback_flags),
            clamp(self.order),
            clamp(self.row),
            clamp(self.pattern),
            clamp(self.total_rows),
            clamp(channel_count),
            clamp(self.master_volume),
            clamp(self.mixer_flags),
            clamp(self.input_volume),
            clamp(self.effects_routing),
            clamp(self.stereo_separation),
            tempo_lsb,
            tempo_msb,
            clamp(self.master_pan),
            clamp(self.input_pan),
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        PlayerStateHeader {
            playback_flags: bytes[0],
            order: bytes[1],
            row: bytes[2],
            pattern: bytes[3],
            total_rows: bytes[4],
            master_volume: bytes[6],
            mixer_flags: bytes[7],
            input_volume: bytes[8],
            effects_routing: bytes[9],
            stereo_separation: bytes[10],
            tempo: join_u14(bytes[11], bytes[12]),
            master_pan: bytes[13],
            input_pan: bytes[14],
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback_flags & playback_flags::PLAYING != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStateSnapshot {
    pub header: PlayerStateHeader,
    pub mute_bits: Vec<u8>,
    pub volumes: Vec<u8>,
    pub pans: Vec<u8>,
}

impl PlayerStateSnapshot {
    /// Returns `None` unless all arrays describe the same 1-127 channels.
    pub fn new(
        header: PlayerStateHeader,
        muted: &[bool],
        volumes: &[u8],
        pans: &[u8],
    ) -> Option<Self> {
        let channels = muted.len();
        if !valid_channel_count(channels) || volumes.len() != channels || pans.len() != channels
        {
            return None;
        }
        Some(PlayerStateSnapshot {
            header,
            mute_bits: pack_mute_bits(muted),
            volumes: volumes.iter().map(|v| (*v).min(0x7F)).collect(),
            pans: pans.iter().map(|p| (*p).min(0x7F)).collect(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_muted(&self, channel: usize) -> bool {
        channel < self.channel_count()
            && self
                .mute_bits
                .get(channel / 8)
                .is_some_and(|byte| byte & (1 << (channel % 8)) != 0)
    }
}

/// Parses the payload of a state-sync frame. The embedded channel count
/// decides the layout, and the frame must be exactly as long as that count
/// implies.
pub(super) fn parse(
    payload: &[u8],
    total_len: usize,
) -> Result<PlayerStateSnapshot, ProtocolError> {
    if payload.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated {
            expected: FRAME_OVERHEAD + HEADER_LEN,
            actual: total_len,
        });
    }

    let header_bytes = &payload[..HEADER_LEN];
    if header_bytes.iter().any(|b| b & 0x80 != 0) {
        return Err(ProtocolError::InvalidPayload("status byte inside header"));
    }

    let channels = usize::from(header_bytes[CHANNEL_COUNT_OFFSET]);
    if !valid_channel_count(channels) {
        return Err(ProtocolError::InvalidPayload("channel count out of range"));
    }

    let expected = frame_len(channels);
    if total_len < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: total_len,
        });
    }
    if total_len > expected {
        return Err(ProtocolError::InvalidPayload(
            "frame longer than channel count implies",
        ));
    }

    let mutes_end = HEADER_LEN + mute_bytes(channels);
    let volumes_end = mutes_end + channels;
    let pans_end = volumes_end + channels;

    Ok(PlayerStateSnapshot {
        header: PlayerStateHeader::from_bytes(header_bytes),
        mute_bits: payload[HEADER_LEN..mutes_end].to_vec(),
        volumes: payload[mutes_end..volumes_end].to_vec(),
        pans: payload[volumes_end..pans_end].to_vec(),
    })
}
