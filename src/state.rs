//! Transport values shared between the render thread and the clock thread.
//!
//! All loads and stores use relaxed ordering. A reader may observe a value
//! that is up to one scheduler iteration old; tempo is smoothed downstream
//! and song positions only move forward within a pattern loop, so that
//! staleness is tolerated.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

/// Tempo is stored as BPM × 1000.
pub const TEMPO_SCALE: f64 = 1000.0;

/// Largest value a Song Position Pointer can carry.
pub const MAX_SONG_POSITION: u32 = 0x3FFF;

pub type SharedTransport = Arc<TransportState>;

pub struct TransportState {
    target_tempo_scaled: AtomicI32,
    is_playing: AtomicBool,
    song_position: AtomicU32,
    spp_pending: AtomicBool,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            target_tempo_scaled: AtomicI32::new(scale_tempo(125.0)),
            is_playing: AtomicBool::new(false),
            song_position: AtomicU32::new(0),
            spp_pending: AtomicBool::new(false),
        }
    }
}

pub fn scale_tempo(bpm: f64) -> i32 {
    if !bpm.is_finite() {
        return 0;
    }
    (bpm * TEMPO_SCALE)
        .round()
        .clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTransport {
        Arc::new(Self::new())
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.target_tempo_scaled
            .store(scale_tempo(bpm), Ordering::Relaxed);
    }

    pub fn tempo(&self) -> f64 {
        f64::from(self.tempo_scaled()) / TEMPO_SCALE
    }

    pub fn tempo_scaled(&self) -> i32 {
        self.target_tempo_scaled.load(Ordering::Relaxed)
    }

    pub fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    /// Updates the song position (in MIDI beats) without asking for an SPP.
    pub fn publish_position(&self, midi_beats: u32) {
        self.song_position.store(midi_beats, Ordering::Relaxed);
    }

    /// Updates the song position and flags it for SPP emission on the next
    /// scheduler iteration.
    pub fn request_song_position(&self, midi_beats: u32) {
        self.song_position.store(midi_beats, Ordering::Relaxed);
        self.spp_pending.store(true, Ordering::Relaxed);
    }

    pub fn song_position(&self) -> u32 {
        self.song_position.load(Ordering::Relaxed)
    }

    /// Clears the pending flag and returns the position to send, if any.
    pub fn take_song_position_request(&self) -> Option<u16> {
        if self.spp_pending.swap(false, Ordering::Relaxed) {
            Some(self.song_position().min(MAX_SONG_POSITION) as u16)
        } else {
            None
        }
    }

    /// Per-buffer publication from the render thread.
    pub fn publish(&self, bpm: f64, playing: bool, midi_beats: u32) {
        self.set_tempo(bpm);
        self.publish_position(midi_beats);
        self.set_playing(playing);
    }
}
