//! Vendor SysEx dialect: `F0 7D <device> <command> [payload] F7`.
//!
//! Every builder writes into a caller-supplied buffer and returns the frame
//! length, or 0 if the buffer is too small or a field does not fit in a
//! MIDI data byte.

use super::snapshot::{self, PlayerStateHeader, PlayerStateSnapshot};
use super::{
    check_frame, is_data_byte, join_u14, split_u14, write_frame, DeviceId, ProtocolContext,
    ProtocolError, VENDOR_ID,
};

/// `F0 7D <device> <command> F7`
pub const MIN_FRAME_LEN: usize = 5;

/// Bytes around the payload.
pub const FRAME_OVERHEAD: usize = 5;

/// Longest file name the length prefix can express.
pub const MAX_FILE_NAME_LEN: usize = 127;

pub const MAX_TEMPO: u16 = 0x3FFF;

/// Command bytes of the vendor dialect.
pub mod command {
    pub const PING: u8 = 0x01;
    pub const LOAD_FILE: u8 = 0x10;
    pub const PLAY: u8 = 0x20;
    pub const STOP: u8 = 0x21;
    pub const PAUSE: u8 = 0x22;
    pub const RETRIGGER: u8 = 0x23;
    pub const CHANNEL_MUTE: u8 = 0x30;
    pub const CHANNEL_SOLO: u8 = 0x31;
    pub const CHANNEL_VOLUME: u8 = 0x32;
    pub const JUMP: u8 = 0x40;
    pub const SET_LOOP: u8 = 0x41;
    pub const SET_TEMPO: u8 = 0x42;
    pub const TRIGGER_PHRASE: u8 = 0x50;
    pub const TRIGGER_LOOP: u8 = 0x51;
    pub const TRIGGER_PAD: u8 = 0x52;
    pub const GET_PLAYER_STATE: u8 = 0x60;
    pub const PLAYER_STATE: u8 = 0x61;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopRange {
    pub start_order: u8,
    pub start_row: u8,
    pub end_order: u8,
    pub end_row: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SysExCommand {
    Ping,
    LoadFile(String),
    Play,
    Stop,
    Pause,
    Retrigger,
    Mute { channel: u8, muted: bool },
    Solo { channel: u8, soloed: bool },
    Volume { channel: u8, volume: u8 },
    Jump { order: u8, row: u8 },
    SetLoop(LoopRange),
    /// Whole BPM, 14 bits
    SetTempo(u16),
    TriggerPhrase(u8),
    TriggerLoop(u8),
    TriggerPad { pad: u8, velocity: u8 },
    GetPlayerState,
    PlayerState(PlayerStateSnapshot),
}

impl SysExCommand {
    pub fn code(&self) -> u8 {
        match self {
            SysExCommand::Ping => command::PING,
            SysExCommand::LoadFile(_) => command::LOAD_FILE,
            SysExCommand::Play => command::PLAY,
            SysExCommand::Stop => command::STOP,
            SysExCommand::Pause => command::PAUSE,
            SysExCommand::Retrigger => command::RETRIGGER,
            SysExCommand::Mute { .. } => command::CHANNEL_MUTE,
            SysExCommand::Solo { .. } => command::CHANNEL_SOLO,
            SysExCommand::Volume { .. } => command::CHANNEL_VOLUME,
            SysExCommand::Jump { .. } => command::JUMP,
            SysExCommand::SetLoop(_) => command::SET_LOOP,
            SysExCommand::SetTempo(_) => command::SET_TEMPO,
            SysExCommand::TriggerPhrase(_) => command::TRIGGER_PHRASE,
            SysExCommand::TriggerLoop(_) => command::TRIGGER_LOOP,
            SysExCommand::TriggerPad { .. } => command::TRIGGER_PAD,
            SysExCommand::GetPlayerState => command::GET_PLAYER_STATE,
            SysExCommand::PlayerState(_) => command::PLAYER_STATE,
        }
    }

    /// Exact frame length this command encodes to.
    pub fn encoded_len(&self) -> usize {
        match self {
            SysExCommand::LoadFile(name) => FRAME_OVERHEAD + 1 + name.len(),
            SysExCommand::PlayerState(state) => snapshot::frame_len(state.channel_count()),
            other => FRAME_OVERHEAD + fixed_payload_len(other.code()).unwrap_or(0),
        }
    }

    pub fn encode(&self, dest: &mut [u8], target: DeviceId) -> usize {
        match self {
            SysExCommand::Ping => build_ping(dest, target),
            SysExCommand::LoadFile(name) => build_load_file(dest, target, name),
            SysExCommand::Play => build_play(dest, target),
            SysExCommand::Stop => build_stop(dest, target),
            SysExCommand::Pause => build_pause(dest, target),
            SysExCommand::Retrigger => build_retrigger(dest, target),
            SysExCommand::Mute { channel, muted } => build_mute(dest, target, *channel, *muted),
            SysExCommand::Solo { channel, soloed } => build_solo(dest, target, *channel, *soloed),
            SysExCommand::Volume { channel, volume } => {
                build_volume(dest, target, *channel, *volume)
            }
            SysExCommand::Jump { order, row } => build_jump(dest, target, *order, *row),
            SysExCommand::SetLoop(range) => build_set_loop(dest, target, range),
            SysExCommand::SetTempo(bpm) => build_set_tempo(dest, target, f64::from(*bpm)),
            SysExCommand::TriggerPhrase(slot) => build_trigger_phrase(dest, target, *slot),
            SysExCommand::TriggerLoop(slot) => build_trigger_loop(dest, target, *slot),
            SysExCommand::TriggerPad { pad, velocity } => {
                build_trigger_pad(dest, target, *pad, *velocity)
            }
            SysExCommand::GetPlayerState => build_get_player_state(dest, target),
            SysExCommand::PlayerState(state) => build_player_state(
                dest,
                target,
                &state.header,
                &state.mute_bits,
                &state.volumes,
                &state.pans,
            ),
        }
    }

    pub fn to_bytes(&self, target: DeviceId) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len()];
        let len = self.encode(&mut buf, target);
        (len > 0).then(|| {
            buf.truncate(len);
            buf
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SysExMessage {
    /// Device id carried in the frame (ours or broadcast)
    pub device_id: u8,
    pub command: SysExCommand,
}

fn fixed_payload_len(code: u8) -> Option<usize> {
    match code {
        command::PING
        | command::PLAY
        | command::STOP
        | command::PAUSE
        | command::RETRIGGER
        | command::GET_PLAYER_STATE => Some(0),
        command::TRIGGER_PHRASE | command::TRIGGER_LOOP => Some(1),
        command::CHANNEL_MUTE
        | command::CHANNEL_SOLO
        | command::CHANNEL_VOLUME
        | command::JUMP
        | command::SET_TEMPO
        | command::TRIGGER_PAD => Some(2),
        command::SET_LOOP => Some(4),
        _ => None,
    }
}

fn frame(dest: &mut [u8], target: DeviceId, code: u8, payload: &[u8]) -> usize {
    if !payload.iter().all(|b| is_data_byte(*b)) {
        return 0;
    }
    write_frame(dest, &[VENDOR_ID, target.get(), code], &[payload])
}

pub fn build_ping(dest: &mut [u8], target: DeviceId) -> usize {
    frame(dest, target, command::PING, &[])
}

/// The name is sent as raw UTF-8 and must be 1-127 bytes long. UTF-8
/// never contains `F0` or `F7`, so the frame stays intact.
pub fn build_load_file(dest: &mut [u8], target: DeviceId, name: &str) -> usize {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
        return 0;
    }
    write_frame(
        dest,
        &[VENDOR_ID, target.get(), command::LOAD_FILE],
        &[&[name.len() as u8], name.as_bytes()],
    )
}

pub fn build_play(dest: &mut [u8], target: DeviceId) -> usize {
    frame(dest, target, command::PLAY, &[])
}

pub fn build_stop(dest: &mut [u8], target: DeviceId) -> usize {
    frame(dest, target, command::STOP, &[])
}

pub fn build_pause(dest: &mut [u8], target: DeviceId) -> usize {
    frame(dest, target, command::PAUSE, &[])
}

pub fn build_retrigger(dest: &mut [u8], target: DeviceId) -> usize {
    frame(dest, target, command::RETRIGGER, &[])
}

pub fn build_mute(dest: &mut [u8], target: DeviceId, channel: u8, muted: bool) -> usize {
    frame(dest, target, command::CHANNEL_MUTE, &[channel, u8::from(muted)])
}

pub fn build_solo(dest: &mut [u8], target: DeviceId, channel: u8, soloed: bool) -> usize {
    frame(dest, target, command::CHANNEL_SOLO, &[channel, u8::from(soloed)])
}

pub fn build_volume(dest: &mut [u8], target: DeviceId, channel: u8, volume: u8) -> usize {
    frame(dest, target, command::CHANNEL_VOLUME, &[channel, volume])
}

pub fn build_jump(dest: &mut [u8], target: DeviceId, order: u8, row: u8) -> usize {
    frame(dest, target, command::JUMP, &[order, row])
}

pub fn build_set_loop(dest: &mut [u8], target: DeviceId, range: &LoopRange) -> usize {
    frame(
        dest,
        target,
        command::SET_LOOP,
        &[
            range.start_order,
            range.start_row,
            range.end_order,
            range.end_row,
        ],
    )
}

/// Tempo is rounded to whole BPM and sent as 14 bits, LSB first.
pub fn build_set_tempo(dest: &mut [u8], target: DeviceId, bpm: f64) -> usize {
    if !bpm.is_finite() || bpm < 0.0 || bpm.round() > f64::from(MAX_TEMPO) {
        return 0;
    }
    frame(
        dest,
        target,
        command::SET_TEMPO,
        &split_u14(bpm.round() as u16),
    )
}

pub fn build_trigger_phrase(dest: &mut [u8], target: DeviceId, slot: u8) -> usize {
    frame(dest, target, command::TRIGGER_PHRASE, &[slot])
}

pub fn build_trigger_loop(dest: &mut [u8], target: DeviceId, slot: u8) -> usize {
    frame(dest, target, command::TRIGGER_LOOP, &[slot])
}

pub fn build_trigger_pad(dest: &mut [u8], target: DeviceId, pad: u8, velocity: u8) -> usize {
    frame(dest, target, command::TRIGGER_PAD, &[pad, velocity])
}

pub fn build_get_player_state(dest: &mut [u8], target: DeviceId) -> usize {
    frame(dest, target, command::GET_PLAYER_STATE, &[])
}

/// Builds the state-sync response. `mute_bits` must already be packed
/// (`ceil(n / 8)` bytes); `volumes` and `pans` hold one byte per channel.
pub fn build_player_state(
    dest: &mut [u8],
    target: DeviceId,
    header: &PlayerStateHeader,
    mute_bits: &[u8],
    volumes: &[u8],
    pans: &[u8],
) -> usize {
    let channels = volumes.len();
    if !snapshot::valid_channel_count(channels)
        || pans.len() != channels
        || mute_bits.len() != snapshot::mute_bytes(channels)
        || !volumes.iter().chain(pans).all(|b| is_data_byte(*b))
    {
        return 0;
    }

    let header_bytes = header.to_bytes(channels as u8);
    write_frame(
        dest,
        &[VENDOR_ID, target.get(), command::PLAYER_STATE],
        &[&header_bytes, mute_bits, volumes, pans],
    )
}

pub(super) fn decode(ctx: &ProtocolContext, bytes: &[u8]) -> Result<SysExMessage, ProtocolError> {
    check_frame(bytes, MIN_FRAME_LEN)?;
    if bytes[1] != VENDOR_ID {
        return Err(ProtocolError::UnknownVendor(bytes[1]));
    }

    let target = bytes[2];
    if !is_data_byte(target) {
        return Err(ProtocolError::InvalidPayload("device id is not a data byte"));
    }
    ctx.check_address(target)?;

    let code = bytes[3];
    let payload = &bytes[4..bytes.len() - 1];
    let command = parse_command(code, payload, bytes.len())?;

    Ok(SysExMessage {
        device_id: target,
        command,
    })
}

fn parse_command(
    code: u8,
    payload: &[u8],
    frame_len: usize,
) -> Result<SysExCommand, ProtocolError> {
    match code {
        command::LOAD_FILE => return parse_load_file(payload, frame_len),
        command::PLAYER_STATE => {
            return snapshot::parse(payload, frame_len).map(SysExCommand::PlayerState)
        }
        _ => {}
    }

    let expected = fixed_payload_len(code).ok_or(ProtocolError::UnknownCommand(code))?;
    if payload.len() < expected {
        return Err(ProtocolError::Truncated {
            expected: FRAME_OVERHEAD + expected,
            actual: frame_len,
        });
    }
    if payload.len() > expected {
        return Err(ProtocolError::InvalidPayload("trailing bytes after payload"));
    }
    if !payload.iter().all(|b| is_data_byte(*b)) {
        return Err(ProtocolError::InvalidPayload("status byte inside payload"));
    }

    let command = match code {
        command::PING => SysExCommand::Ping,
        command::PLAY => SysExCommand::Play,
        command::STOP => SysExCommand::Stop,
        command::PAUSE => SysExCommand::Pause,
        command::RETRIGGER => SysExCommand::Retrigger,
        command::GET_PLAYER_STATE => SysExCommand::GetPlayerState,
        command::CHANNEL_MUTE => SysExCommand::Mute {
            channel: payload[0],
            muted: parse_flag(payload[1])?,
        },
        command::CHANNEL_SOLO => SysExCommand::Solo {
            channel: payload[0],
            soloed: parse_flag(payload[1])?,
        },
        command::CHANNEL_VOLUME => SysExCommand::Volume {
            channel: payload[0],
            volume: payload[1],
        },
        command::JUMP => SysExCommand::Jump {
            order: payload[0],
            row: payload[1],
        },
        command::SET_LOOP => SysExCommand::SetLoop(LoopRange {
            start_order: payload[0],
            start_row: payload[1],
            end_order: payload[2],
            end_row: payload[3],
        }),
        command::SET_TEMPO => SysExCommand::SetTempo(join_u14(payload[0], payload[1])),
        command::TRIGGER_PHRASE => SysExCommand::TriggerPhrase(payload[0]),
        command::TRIGGER_LOOP => SysExCommand::TriggerLoop(payload[0]),
        command::TRIGGER_PAD => SysExCommand::TriggerPad {
            pad: payload[0],
            velocity: payload[1],
        },
        other => return Err(ProtocolError::UnknownCommand(other)),
    };
    Ok(command)
}

fn parse_flag(byte: u8) -> Result<bool, ProtocolError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProtocolError::InvalidPayload("flag must be 0 or 1")),
    }
}

fn parse_load_file(payload: &[u8], frame_len: usize) -> Result<SysExCommand, ProtocolError> {
    let Some((&name_len, name)) = payload.split_first() else {
        return Err(ProtocolError::Truncated {
            expected: FRAME_OVERHEAD + 1,
            actual: frame_len,
        });
    };
    let name_len = usize::from(name_len);
    if name.len() < name_len {
        return Err(ProtocolError::Truncated {
            expected: FRAME_OVERHEAD + 1 + name_len,
            actual: frame_len,
        });
    }
    if name.len() > name_len {
        return Err(ProtocolError::InvalidPayload("trailing bytes after file name"));
    }
    if name_len == 0 {
        return Err(ProtocolError::InvalidPayload("empty file name"));
    }
    let name = String::from_utf8(name.to_vec())
        .map_err(|_| ProtocolError::InvalidPayload("file name is not UTF-8"))?;
    Ok(SysExCommand::LoadFile(name))
}
