//! MIDI functionality for RowSync
//!
//! This module provides MIDI communication capabilities, including:
//! - Core MIDI message types and error handling
//! - The clock pulse scheduler thread
//! - Tracker channel to MIDI note/program translation
//! - Real MIDI device communication via midir
//! - A recording engine for tests
//!
//! The main components are:
//! - [`MidiEngine`] trait for sending and receiving MIDI messages
//! - [`MidiOut`] shared, fire-and-forget output handle
//! - [`ClockScheduler`] and [`ClockRunner`] for MIDI clock output
//! - [`OutputChannels`] for note and program-change traffic
//!
pub mod channels;
pub mod clock;
pub mod engine;
pub mod midir_engine;
pub mod mock_engine;
mod output;

// Re-export main types from engine
pub use engine::{MidiEngine, MidiError, MidiMessage, Result};

// Re-export concrete implementations
pub use midir_engine::MidirEngine;
pub use mock_engine::MockMidiEngine;
pub use output::MidiOut;

pub use channels::{InstrumentRoute, OutputChannels, TrackerNote};
pub use clock::{ClockRunner, ClockScheduler, MonotonicTimer, Timer};

// Set default engine type
pub type DefaultMidiEngine = MidirEngine;
