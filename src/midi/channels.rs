//! Tracker output channels mapped onto MIDI notes and program changes.
//!
//! Each tracker channel holds at most one sounding MIDI note. A new note on
//! the same tracker channel releases the previous one first. Program
//! changes are cached per MIDI channel and only resent when the program
//! differs or the cache has been invalidated.

use crate::config::{MAX_TRACKER_CHANNELS, MIDI_CHANNELS};
use crate::midi::{MidiEngine, MidiError, MidiMessage};
use log::{debug, warn};
use std::error::Error;
use std::fmt;

/// Highest tracker volume.
pub const MAX_TRACKER_VOLUME: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    InvalidChannelCount(usize),
    InvalidMidiChannel(u8),
    InvalidProgram(u8),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::InvalidChannelCount(n) => write!(
                f,
                "tracker channel count {} outside 1-{}",
                n, MAX_TRACKER_CHANNELS
            ),
            ChannelError::InvalidMidiChannel(ch) => write!(f, "MIDI channel {} outside 0-15", ch),
            ChannelError::InvalidProgram(p) => write!(f, "program {} outside 0-127", p),
        }
    }
}

impl Error for ChannelError {}

/// Note column content of one tracker event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerNote {
    /// No note; instrument/volume-only rows do not retrigger
    Empty,
    /// Note number, same scale as MIDI
    On(u8),
    /// Key off
    Off,
    /// Note cut
    Cut,
}

/// Where an instrument plays on the MIDI side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrumentRoute {
    pub midi_channel: u8,
    pub program: Option<u8>,
    pub transpose: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSlot {
    pub active: bool,
    pub midi_channel: u8,
    pub note: u8,
    /// Last instrument seen on this channel, reused when a row omits it
    pub instrument: u8,
}

/// Tracker volume 0-64 to velocity 0-127.
pub fn volume_to_velocity(volume: u8) -> u8 {
    let max = u16::from(MAX_TRACKER_VOLUME);
    let volume = u16::from(volume).min(max);
    ((volume * 127 + max / 2) / max).min(127) as u8
}

pub struct OutputChannels {
    slots: Vec<ChannelSlot>,
    routes: Vec<Option<InstrumentRoute>>,
    program_cache: [Option<u8>; MIDI_CHANNELS],
}

impl OutputChannels {
    pub fn new(channel_count: usize) -> Result<Self, ChannelError> {
        if !(1..=MAX_TRACKER_CHANNELS).contains(&channel_count) {
            return Err(ChannelError::InvalidChannelCount(channel_count));
        }
        Ok(Self {
            slots: vec![ChannelSlot::default(); channel_count],
            routes: vec![None; usize::from(u8::MAX) + 1],
            program_cache: [None; MIDI_CHANNELS],
        })
    }

    pub fn channel_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, tracker_channel: usize) -> Option<&ChannelSlot> {
        self.slots.get(tracker_channel)
    }

    pub fn cached_program(&self, midi_channel: u8) -> Option<u8> {
        self.program_cache
            .get(usize::from(midi_channel))
            .copied()
            .flatten()
    }

    pub fn set_route(
        &mut self,
        instrument: u8,
        route: InstrumentRoute,
    ) -> Result<(), ChannelError> {
        if usize::from(route.midi_channel) >= MIDI_CHANNELS {
            return Err(ChannelError::InvalidMidiChannel(route.midi_channel));
        }
        if let Some(program) = route.program.filter(|p| *p > 127) {
            return Err(ChannelError::InvalidProgram(program));
        }
        self.routes[usize::from(instrument)] = Some(route);
        Ok(())
    }

    pub fn clear_route(&mut self, instrument: u8) {
        self.routes[usize::from(instrument)] = None;
    }

    /// Handles one tracker note event.
    pub fn note_event(
        &mut self,
        out: &mut dyn MidiEngine,
        tracker_channel: usize,
        note: TrackerNote,
        instrument: u8,
        volume: u8,
    ) {
        if tracker_channel >= self.slots.len() {
            debug!("Ignoring note on tracker channel {}", tracker_channel);
            return;
        }

        let note = match note {
            TrackerNote::Empty => return,
            TrackerNote::Off | TrackerNote::Cut => {
                self.release(out, tracker_channel);
                return;
            }
            TrackerNote::On(note) => note,
        };

        // A new note always ends the previous one, even if it cannot be routed
        self.release(out, tracker_channel);

        let instrument = if instrument == 0 {
            self.slots[tracker_channel].instrument
        } else {
            instrument
        };
        self.slots[tracker_channel].instrument = instrument;

        let Some(route) = self.routes[usize::from(instrument)] else {
            return;
        };

        let midi_note = i16::from(note) + i16::from(route.transpose);
        if !(0..=127).contains(&midi_note) {
            debug!("Note {} out of MIDI range after transpose", midi_note);
            return;
        }

        if let Some(program) = route.program {
            let cached = &mut self.program_cache[usize::from(route.midi_channel)];
            if *cached != Some(program) {
                send(
                    out,
                    MidiMessage::ProgramChange {
                        channel: route.midi_channel,
                        program,
                    },
                );
                *cached = Some(program);
            }
        }

        let velocity = volume_to_velocity(volume);
        if velocity == 0 {
            return;
        }

        send(
            out,
            MidiMessage::NoteOn {
                channel: route.midi_channel,
                note: midi_note as u8,
                velocity,
            },
        );
        let slot = &mut self.slots[tracker_channel];
        slot.active = true;
        slot.midi_channel = route.midi_channel;
        slot.note = midi_note as u8;
    }

    /// Sends note-off for whatever the tracker channel is holding.
    pub fn release(&mut self, out: &mut dyn MidiEngine, tracker_channel: usize) {
        let Some(slot) = self.slots.get_mut(tracker_channel) else {
            return;
        };
        if slot.active {
            slot.active = false;
            send(
                out,
                MidiMessage::NoteOff {
                    channel: slot.midi_channel,
                    note: slot.note,
                    velocity: 0,
                },
            );
        }
    }

    /// Forces the next note on every MIDI channel to resend its program.
    pub fn invalidate_programs(&mut self) {
        self.program_cache = [None; MIDI_CHANNELS];
    }

    pub fn on_order_boundary(&mut self) {
        debug!("Order boundary, program cache invalidated");
        self.invalidate_programs();
    }

    pub fn on_loop_retrigger(&mut self) {
        debug!("Loop retrigger, program cache invalidated");
        self.invalidate_programs();
    }

    /// Releases every channel and clears the program cache.
    pub fn all_notes_off(&mut self, out: &mut dyn MidiEngine) {
        for channel in 0..self.slots.len() {
            self.release(out, channel);
        }
        self.invalidate_programs();
    }
}

fn send(out: &mut dyn MidiEngine, msg: MidiMessage) {
    match out.send(msg) {
        Ok(()) | Err(MidiError::DeviceUnavailable) => {}
        Err(e) => warn!("{}", e),
    }
}
