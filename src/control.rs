//! Applies decoded control frames to the host player.
//!
//! The host implements [`PlaybackControl`]; [`ControlRouter`] decodes raw
//! input packets through its [`ProtocolContext`] and calls the matching
//! method. Malformed frames and frames addressed elsewhere are logged at
//! debug level and dropped.

use crate::midi::engine::SYSEX_START;
use crate::midi::{MidiMessage, MidiOut};
use crate::protocol::mmc::position_to_order_row;
use crate::protocol::{
    DeviceId, Incoming, LocateType, LoopRange, MmcCommand, PlayerStateSnapshot, ProtocolContext,
    SysExCommand, SysExMessage,
};
use log::{debug, info, trace};

/// Playback operations a remote controller can drive.
///
/// Everything except the transport trio defaults to doing nothing, so a
/// host only implements what it supports.
pub trait PlaybackControl {
    fn play(&mut self);

    fn stop(&mut self);

    fn pause(&mut self);

    fn retrigger(&mut self) {}

    fn load_file(&mut self, _name: &str) {}

    fn set_channel_mute(&mut self, _channel: u8, _muted: bool) {}

    fn set_channel_solo(&mut self, _channel: u8, _soloed: bool) {}

    fn set_channel_volume(&mut self, _channel: u8, _volume: u8) {}

    fn jump(&mut self, _order: u8, _row: u8) {}

    fn set_loop_range(&mut self, _range: LoopRange) {}

    /// Loop start from an MMC locate.
    fn set_loop_start(&mut self, _order: u8, _row: u8) {}

    /// Loop end from an MMC locate.
    fn set_loop_end(&mut self, _order: u8, _row: u8) {}

    fn set_tempo(&mut self, _bpm: u16) {}

    fn trigger_phrase(&mut self, _slot: u8) {}

    fn trigger_loop(&mut self, _slot: u8) {}

    fn trigger_pad(&mut self, _pad: u8, _velocity: u8) {}

    fn record_strobe(&mut self) {}

    fn record_exit(&mut self) {}

    /// Current state for a state-sync request. `None` leaves the request
    /// unanswered.
    fn player_state(&self) -> Option<PlayerStateSnapshot> {
        None
    }

    /// State received from another instance.
    fn mirror_state(&mut self, _state: &PlayerStateSnapshot) {}

    fn remote_ping(&mut self, _sender: u8) {}
}

#[derive(Clone)]
pub struct ControlRouter {
    ctx: ProtocolContext,
    out: MidiOut,
}

impl ControlRouter {
    pub fn new(device_id: DeviceId, out: MidiOut) -> Self {
        Self {
            ctx: ProtocolContext::new(device_id),
            out,
        }
    }

    pub fn context(&self) -> &ProtocolContext {
        &self.ctx
    }

    pub fn device_id(&self) -> DeviceId {
        self.ctx.device_id()
    }

    pub fn set_device_id(&mut self, device_id: DeviceId) {
        info!("Protocol device id set to {}", device_id.get());
        self.ctx.set_device_id(device_id);
    }

    /// Decodes one input packet and applies it. Returns the decoded frame so
    /// callers can inspect what happened.
    pub fn handle(&self, bytes: &[u8], player: &mut dyn PlaybackControl) -> Option<Incoming> {
        if bytes.first() != Some(&SYSEX_START) {
            // Channel and realtime traffic from the same port
            if let Some(msg) = MidiMessage::parse(bytes) {
                trace!("Ignoring {:?}", msg);
            }
            return None;
        }

        match self.ctx.decode(bytes) {
            Ok(incoming) => {
                self.apply(&incoming, player);
                Some(incoming)
            }
            Err(e) if e.is_address_mismatch() => {
                trace!("{}", e);
                None
            }
            Err(e) => {
                debug!("Dropping SysEx frame: {}", e);
                None
            }
        }
    }

    pub fn apply(&self, incoming: &Incoming, player: &mut dyn PlaybackControl) {
        match incoming {
            Incoming::SysEx(msg) => self.apply_sysex(msg, player),
            Incoming::Mmc(msg) => {
                debug!("MMC {:?} for device {}", msg.command, msg.device_id);
                apply_mmc(&msg.command, player);
            }
        }
    }

    fn apply_sysex(&self, msg: &SysExMessage, player: &mut dyn PlaybackControl) {
        debug!("SysEx {:?} for device {}", msg.command, msg.device_id);
        match &msg.command {
            SysExCommand::Ping => player.remote_ping(msg.device_id),
            SysExCommand::LoadFile(name) => player.load_file(name),
            SysExCommand::Play => player.play(),
            SysExCommand::Stop => player.stop(),
            SysExCommand::Pause => player.pause(),
            SysExCommand::Retrigger => player.retrigger(),
            SysExCommand::Mute { channel, muted } => player.set_channel_mute(*channel, *muted),
            SysExCommand::Solo { channel, soloed } => player.set_channel_solo(*channel, *soloed),
            SysExCommand::Volume { channel, volume } => {
                player.set_channel_volume(*channel, *volume)
            }
            SysExCommand::Jump { order, row } => player.jump(*order, *row),
            SysExCommand::SetLoop(range) => player.set_loop_range(*range),
            SysExCommand::SetTempo(bpm) => player.set_tempo(*bpm),
            SysExCommand::TriggerPhrase(slot) => player.trigger_phrase(*slot),
            SysExCommand::TriggerLoop(slot) => player.trigger_loop(*slot),
            SysExCommand::TriggerPad { pad, velocity } => player.trigger_pad(*pad, *velocity),
            SysExCommand::GetPlayerState => self.answer_state_request(player),
            SysExCommand::PlayerState(state) => player.mirror_state(state),
        }
    }

    fn answer_state_request(&self, player: &dyn PlaybackControl) {
        let Some(state) = player.player_state() else {
            debug!("State request received but the player has no state to report");
            return;
        };
        match SysExCommand::PlayerState(state).to_bytes(DeviceId::BROADCAST) {
            Some(frame) => self.out.transmit(MidiMessage::SysEx(frame)),
            None => debug!("Player state did not encode"),
        }
    }
}

fn apply_mmc(command: &MmcCommand, player: &mut dyn PlaybackControl) {
    match command {
        MmcCommand::Stop => player.stop(),
        MmcCommand::Play => player.play(),
        MmcCommand::Pause => player.pause(),
        MmcCommand::RecordStrobe => player.record_strobe(),
        MmcCommand::RecordExit => player.record_exit(),
        MmcCommand::Locate { kind, position } => {
            let (order, row) = position_to_order_row(position);
            match kind {
                LocateType::Jump => player.jump(order, row),
                LocateType::LoopStart => player.set_loop_start(order, row),
                LocateType::LoopEnd => player.set_loop_end(order, row),
            }
        }
    }
}
