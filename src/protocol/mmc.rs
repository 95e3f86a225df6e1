//! MIDI Machine Control subset: `F0 7F <device> 06 <command> [data] F7`.
//!
//! Locate reuses the standard hours:minutes:seconds:frames fields as
//! order:row:0:0, so a locate addresses a tracker position instead of a
//! timecode. Seconds, frames and subframes are always sent as zero and are
//! ignored on receipt.

use super::{check_frame, is_data_byte, write_frame, DeviceId, ProtocolContext, ProtocolError};
use super::UNIVERSAL_REALTIME;

/// Sub-ID#1 marking an MMC command frame.
pub const MMC_COMMAND: u8 = 0x06;

/// `F0 7F <device> 06 <command> F7`
pub const MIN_FRAME_LEN: usize = 6;

/// Information field length of a locate command.
pub const LOCATE_INFO_LEN: u8 = 0x06;

/// RP-013 command numbers.
pub mod command {
    pub const STOP: u8 = 0x01;
    pub const PLAY: u8 = 0x02;
    pub const DEFERRED_PLAY: u8 = 0x03;
    pub const RECORD_STROBE: u8 = 0x06;
    pub const RECORD_EXIT: u8 = 0x07;
    pub const PAUSE: u8 = 0x09;
    pub const LOCATE: u8 = 0x44;
}

/// What a locate should do with the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LocateType {
    /// Jump there once
    Jump = 0x01,
    /// Set the loop start boundary
    LoopStart = 0x02,
    /// Set the loop end boundary
    LoopEnd = 0x03,
}

impl LocateType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(LocateType::Jump),
            0x02 => Some(LocateType::LoopStart),
            0x03 => Some(LocateType::LoopEnd),
            _ => None,
        }
    }
}

/// The five standard locate fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmcPosition {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub subframes: u8,
}

pub fn order_row_to_position(order: u8, row: u8) -> MmcPosition {
    MmcPosition {
        hours: order,
        minutes: row,
        ..Default::default()
    }
}

pub fn position_to_order_row(position: &MmcPosition) -> (u8, u8) {
    (position.hours, position.minutes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcCommand {
    Stop,
    Play,
    RecordStrobe,
    RecordExit,
    Pause,
    Locate {
        kind: LocateType,
        position: MmcPosition,
    },
}

impl MmcCommand {
    pub fn locate(kind: LocateType, order: u8, row: u8) -> Self {
        MmcCommand::Locate {
            kind,
            position: order_row_to_position(order, row),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            MmcCommand::Stop => command::STOP,
            MmcCommand::Play => command::PLAY,
            MmcCommand::RecordStrobe => command::RECORD_STROBE,
            MmcCommand::RecordExit => command::RECORD_EXIT,
            MmcCommand::Pause => command::PAUSE,
            MmcCommand::Locate { .. } => command::LOCATE,
        }
    }

    pub fn encode(&self, dest: &mut [u8], target: DeviceId) -> usize {
        match self {
            MmcCommand::Locate { kind, position } => {
                let (order, row) = position_to_order_row(position);
                build_locate(dest, target, *kind, order, row)
            }
            simple => build_simple(dest, target, simple.code()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmcMessage {
    pub device_id: u8,
    pub command: MmcCommand,
}

fn build_simple(dest: &mut [u8], target: DeviceId, code: u8) -> usize {
    write_frame(
        dest,
        &[UNIVERSAL_REALTIME, target.get(), MMC_COMMAND, code],
        &[],
    )
}

pub fn build_stop(dest: &mut [u8], target: DeviceId) -> usize {
    build_simple(dest, target, command::STOP)
}

pub fn build_play(dest: &mut [u8], target: DeviceId) -> usize {
    build_simple(dest, target, command::PLAY)
}

pub fn build_pause(dest: &mut [u8], target: DeviceId) -> usize {
    build_simple(dest, target, command::PAUSE)
}

pub fn build_record_strobe(dest: &mut [u8], target: DeviceId) -> usize {
    build_simple(dest, target, command::RECORD_STROBE)
}

pub fn build_record_exit(dest: &mut [u8], target: DeviceId) -> usize {
    build_simple(dest, target, command::RECORD_EXIT)
}

/// `F0 7F <device> 06 44 06 <type> <order> <row> 00 00 00 F7`
pub fn build_locate(
    dest: &mut [u8],
    target: DeviceId,
    kind: LocateType,
    order: u8,
    row: u8,
) -> usize {
    if !is_data_byte(order) || !is_data_byte(row) {
        return 0;
    }
    write_frame(
        dest,
        &[UNIVERSAL_REALTIME, target.get(), MMC_COMMAND, command::LOCATE],
        &[&[LOCATE_INFO_LEN, kind as u8, order, row, 0, 0, 0]],
    )
}

pub(super) fn decode(ctx: &ProtocolContext, bytes: &[u8]) -> Result<MmcMessage, ProtocolError> {
    check_frame(bytes, MIN_FRAME_LEN)?;
    if bytes[1] != UNIVERSAL_REALTIME || bytes[3] != MMC_COMMAND {
        return Err(ProtocolError::BadFraming);
    }

    let target = bytes[2];
    ctx.check_address(target)?;

    let code = bytes[4];
    let data = &bytes[5..bytes.len() - 1];
    let command = match code {
        command::LOCATE => parse_locate(data, bytes.len())?,
        other => {
            let command = match other {
                command::STOP => MmcCommand::Stop,
                command::PLAY | command::DEFERRED_PLAY => MmcCommand::Play,
                command::RECORD_STROBE => MmcCommand::RecordStrobe,
                command::RECORD_EXIT => MmcCommand::RecordExit,
                command::PAUSE => MmcCommand::Pause,
                unknown => return Err(ProtocolError::UnknownCommand(unknown)),
            };
            if !data.is_empty() {
                return Err(ProtocolError::InvalidPayload("trailing bytes after command"));
            }
            command
        }
    };

    Ok(MmcMessage {
        device_id: target,
        command,
    })
}

fn parse_locate(data: &[u8], frame_len: usize) -> Result<MmcCommand, ProtocolError> {
    let needed = 1 + usize::from(LOCATE_INFO_LEN);
    if data.len() < needed {
        return Err(ProtocolError::Truncated {
            expected: MIN_FRAME_LEN + needed,
            actual: frame_len,
        });
    }
    if data.len() > needed {
        return Err(ProtocolError::InvalidPayload("trailing bytes after locate"));
    }
    if data[0] != LOCATE_INFO_LEN {
        return Err(ProtocolError::InvalidPayload("locate information length"));
    }
    let kind =
        LocateType::from_u8(data[1]).ok_or(ProtocolError::InvalidPayload("unknown locate type"))?;

    Ok(MmcCommand::Locate {
        kind,
        position: MmcPosition {
            hours: data[2],
            minutes: data[3],
            seconds: data[4],
            frames: data[5],
            subframes: data[6],
        },
    })
}
