//! A stand-in tracker engine for the binary.
//!
//! The real player renders audio; this one only advances order and row at
//! the current tempo, answers remote control, and drives [`MidiSync`] the
//! way a render callback would: one publication per simulated buffer, a
//! note event per beat, and an order-boundary notification on every
//! pattern wrap.

use crate::config::ROWS_PER_BEAT;
use crate::control::PlaybackControl;
use crate::midi::{InstrumentRoute, TrackerNote};
use crate::protocol::snapshot::{playback_flags, PlayerStateHeader};
use crate::protocol::{LoopRange, PlayerStateSnapshot};
use crate::sync::MidiSync;
use log::{debug, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

pub const ROWS_PER_PATTERN: u8 = 64;

/// Length of the simulated order list.
pub const ORDER_COUNT: u8 = 16;

/// Interval between publications, roughly one audio buffer.
pub const BUFFER_PERIOD: Duration = Duration::from_millis(10);

const DEMO_INSTRUMENT: u8 = 1;
const DEMO_BASE_NOTE: u8 = 48;
const DEMO_VOLUME: u8 = 48;

pub type SharedPlayer = Arc<Mutex<SimulatedPlayer>>;

/// What happened during one [`SimulatedPlayer::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Advance {
    pub rows: u32,
    pub order_changed: bool,
    pub beat_started: bool,
}

/// Position changes made by control commands since the last render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingEvents {
    pub relocated: bool,
    pub retriggered: bool,
    pub stopped: bool,
}

pub struct SimulatedPlayer {
    playing: bool,
    paused: bool,
    tempo: f64,
    order: u8,
    row: u8,
    row_phase: f64,
    loop_range: Option<LoopRange>,
    muted: Vec<bool>,
    soloed: Vec<bool>,
    volumes: Vec<u8>,
    pans: Vec<u8>,
    file_name: Option<String>,
    pending: PendingEvents,
}

impl SimulatedPlayer {
    pub fn new(channels: usize, tempo: f64) -> Self {
        SimulatedPlayer {
            playing: false,
            paused: false,
            tempo,
            order: 0,
            row: 0,
            row_phase: 0.0,
            loop_range: None,
            muted: vec![false; channels],
            soloed: vec![false; channels],
            volumes: vec![64; channels],
            pans: vec![64; channels],
            file_name: None,
            pending: PendingEvents::default(),
        }
    }

    pub fn shared(channels: usize, tempo: f64) -> SharedPlayer {
        Arc::new(Mutex::new(Self::new(channels, tempo)))
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn order(&self) -> u8 {
        self.order
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn loop_range(&self) -> Option<LoopRange> {
        self.loop_range
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn is_muted(&self, channel: usize) -> bool {
        self.muted.get(channel).copied().unwrap_or(false)
    }

    pub fn volume(&self, channel: usize) -> Option<u8> {
        self.volumes.get(channel).copied()
    }

    /// Song position in MIDI beats. One row is one sixteenth note.
    pub fn midi_beats(&self) -> u32 {
        u32::from(self.order) * u32::from(ROWS_PER_PATTERN) + u32::from(self.row)
    }

    pub fn take_pending(&mut self) -> PendingEvents {
        std::mem::take(&mut self.pending)
    }

    fn seconds_per_row(&self) -> Option<f64> {
        (self.tempo > 0.0).then(|| 60.0 / (self.tempo * f64::from(ROWS_PER_BEAT)))
    }

    /// Moves the play position forward by `secs` of wall time.
    pub fn advance(&mut self, secs: f64) -> Advance {
        let mut step = Advance::default();
        if !self.playing {
            return step;
        }
        let Some(row_len) = self.seconds_per_row() else {
            return step;
        };

        self.row_phase += secs / row_len;
        while self.row_phase >= 1.0 {
            self.row_phase -= 1.0;
            step.rows += 1;
            if self.next_row() {
                step.order_changed = true;
            }
            if u32::from(self.row) % ROWS_PER_BEAT == 0 {
                step.beat_started = true;
            }
        }
        step
    }

    /// Returns true when the order changed.
    fn next_row(&mut self) -> bool {
        if let Some(range) = self.loop_range {
            if self.order == range.end_order && self.row >= range.end_row {
                self.order = range.start_order;
                self.row = range.start_row;
                self.pending.retriggered = true;
                return true;
            }
        }

        self.row += 1;
        if self.row < ROWS_PER_PATTERN {
            return false;
        }
        self.row = 0;
        self.order = (self.order + 1) % ORDER_COUNT;
        true
    }

    fn locate(&mut self, order: u8, row: u8) {
        self.order = order % ORDER_COUNT;
        self.row = row.min(ROWS_PER_PATTERN - 1);
        self.row_phase = 0.0;
        self.pending.relocated = true;
    }

    fn channel_mut<T>(values: &mut [T], channel: u8) -> Option<&mut T> {
        values.get_mut(usize::from(channel))
    }
}

impl PlaybackControl for SimulatedPlayer {
    fn play(&mut self) {
        info!("Play from order {} row {}", self.order, self.row);
        self.playing = true;
        self.paused = false;
    }

    fn stop(&mut self) {
        info!("Stop");
        self.playing = false;
        self.paused = false;
        self.order = 0;
        self.row = 0;
        self.row_phase = 0.0;
        self.pending.stopped = true;
        self.pending.relocated = true;
    }

    fn pause(&mut self) {
        info!("Pause at order {} row {}", self.order, self.row);
        self.playing = false;
        self.paused = true;
        self.pending.stopped = true;
    }

    fn retrigger(&mut self) {
        self.row = 0;
        self.row_phase = 0.0;
        self.pending.retriggered = true;
        self.pending.relocated = true;
    }

    fn load_file(&mut self, name: &str) {
        info!("Load '{}'", name);
        self.file_name = Some(name.to_string());
        self.loop_range = None;
        self.stop();
    }

    fn set_channel_mute(&mut self, channel: u8, muted: bool) {
        match Self::channel_mut(&mut self.muted, channel) {
            Some(slot) => *slot = muted,
            None => debug!("Mute for unknown channel {}", channel),
        }
    }

    fn set_channel_solo(&mut self, channel: u8, soloed: bool) {
        match Self::channel_mut(&mut self.soloed, channel) {
            Some(slot) => *slot = soloed,
            None => debug!("Solo for unknown channel {}", channel),
        }
    }

    fn set_channel_volume(&mut self, channel: u8, volume: u8) {
        match Self::channel_mut(&mut self.volumes, channel) {
            Some(slot) => *slot = volume.min(64),
            None => debug!("Volume for unknown channel {}", channel),
        }
    }

    fn jump(&mut self, order: u8, row: u8) {
        info!("Jump to order {} row {}", order, row);
        self.locate(order, row);
    }

    fn set_loop_range(&mut self, range: LoopRange) {
        info!(
            "Loop {}:{} - {}:{}",
            range.start_order, range.start_row, range.end_order, range.end_row
        );
        self.loop_range = Some(range);
    }

    fn set_loop_start(&mut self, order: u8, row: u8) {
        let mut range = self.loop_range.unwrap_or(LoopRange {
            end_order: order,
            end_row: ROWS_PER_PATTERN - 1,
            ..Default::default()
        });
        range.start_order = order;
        range.start_row = row;
        self.set_loop_range(range);
    }

    fn set_loop_end(&mut self, order: u8, row: u8) {
        let mut range = self.loop_range.unwrap_or_default();
        range.end_order = order;
        range.end_row = row;
        self.set_loop_range(range);
    }

    fn set_tempo(&mut self, bpm: u16) {
        if bpm == 0 {
            warn!("Ignoring zero tempo");
            return;
        }
        info!("Tempo {} BPM", bpm);
        self.tempo = f64::from(bpm);
    }

    fn trigger_phrase(&mut self, slot: u8) {
        info!("Phrase trigger {} (no phrase engine in the simulator)", slot);
    }

    fn trigger_loop(&mut self, slot: u8) {
        info!("Loop trigger {} (no looper in the simulator)", slot);
    }

    fn trigger_pad(&mut self, pad: u8, velocity: u8) {
        info!("Pad {} velocity {}", pad, velocity);
    }

    fn record_strobe(&mut self) {
        info!("Record strobe (recording not supported)");
    }

    fn record_exit(&mut self) {
        info!("Record exit");
    }

    fn player_state(&self) -> Option<PlayerStateSnapshot> {
        let mut flags = 0;
        if self.playing {
            flags |= playback_flags::PLAYING;
        }
        if self.paused {
            flags |= playback_flags::PAUSED;
        }
        if self.loop_range.is_some() {
            flags |= playback_flags::LOOPING;
        }

        let header = PlayerStateHeader {
            playback_flags: flags,
            order: self.order,
            row: self.row,
            pattern: self.order,
            total_rows: ROWS_PER_PATTERN,
            master_volume: 64,
            stereo_separation: 64,
            tempo: self.tempo.round().clamp(0.0, f64::from(u16::MAX)) as u16,
            master_pan: 64,
            input_pan: 64,
            ..Default::default()
        };
        PlayerStateSnapshot::new(header, &self.muted, &self.volumes, &self.pans)
    }

    fn mirror_state(&mut self, state: &PlayerStateSnapshot) {
        debug!(
            "Mirroring remote state: order {} row {} tempo {}",
            state.header.order, state.header.row, state.header.tempo
        );
        if state.header.tempo > 0 {
            self.tempo = f64::from(state.header.tempo);
        }
        if (state.header.order, state.header.row) != (self.order, self.row) {
            self.locate(state.header.order, state.header.row);
        }
        self.playing = state.header.is_playing();
        for channel in 0..self.muted.len().min(state.channel_count()) {
            self.muted[channel] = state.is_muted(channel);
            self.volumes[channel] = state.volumes[channel];
            self.pans[channel] = state.pans[channel];
        }
    }

    fn remote_ping(&mut self, sender: u8) {
        info!("Ping from device {}", sender);
    }
}

/// Routes the demo instrument to MIDI channel 1, program 1.
pub fn install_demo_routes(sync: &mut MidiSync) {
    let route = InstrumentRoute {
        midi_channel: 0,
        program: Some(0),
        transpose: 0,
    };
    if let Err(e) = sync.set_route(DEMO_INSTRUMENT, route) {
        warn!("Demo route rejected: {}", e);
    }
}

/// One render pass: advance the player, forward its events to the sync
/// subsystem and publish tempo and position.
pub fn render_step(sync: &mut MidiSync, player: &mut SimulatedPlayer, secs: f64) {
    let step = player.advance(secs);
    let pending = player.take_pending();

    if pending.stopped {
        sync.stop_notes();
    }
    if pending.retriggered {
        sync.loop_retrigger();
    }
    if step.order_changed {
        sync.order_boundary();
    }
    if pending.relocated {
        sync.request_song_position(player.midi_beats());
    }

    if step.beat_started {
        let channel_count = sync.channels().channel_count();
        let beat = player.midi_beats() / ROWS_PER_BEAT;
        let channel = beat as usize % channel_count;
        if !player.is_muted(channel) {
            let note = DEMO_BASE_NOTE + (player.order() % 12);
            let volume = player.volume(channel).unwrap_or(DEMO_VOLUME).min(DEMO_VOLUME);
            sync.note_event(channel, TrackerNote::On(note), DEMO_INSTRUMENT, volume);
        }
    }

    sync.publish(player.tempo(), player.is_playing(), player.midi_beats());
}

/// Render loop for the simulated player. Runs until `shutdown` is set, then
/// stops the clock and releases every sounding note.
pub fn run_render_simulation(mut sync: MidiSync, player: SharedPlayer, shutdown: Arc<AtomicBool>) {
    install_demo_routes(&mut sync);
    let mut last = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(BUFFER_PERIOD);
        let now = Instant::now();
        let secs = now.duration_since(last).as_secs_f64();
        last = now;

        match player.lock() {
            Ok(mut player) => render_step(&mut sync, &mut player, secs),
            Err(_) => {
                warn!("Player state poisoned, render loop exiting");
                break;
            }
        }
    }

    info!("Render loop stopping");
    sync.shutdown();
}
