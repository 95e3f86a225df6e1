pub mod cli;
pub mod config;
pub mod control;
pub mod logging;
pub mod midi;
pub mod protocol;
pub mod scheduler;
pub mod state;
pub mod sync;
pub mod transport;
pub mod ui;

pub use control::{ControlRouter, PlaybackControl};
pub use protocol::{DeviceId, Incoming, ProtocolContext, ProtocolError};
pub use scheduler::{Scheduler, ThreadScheduler};
pub use state::{SharedTransport, TransportState};
pub use sync::MidiSync;

use midi::MidirEngine;

/// Output port names, for `--device-list` and port validation.
pub fn handle_device_list() -> Vec<String> {
    MidirEngine::list_output_ports()
}

pub fn handle_input_device_list() -> Vec<String> {
    MidirEngine::list_input_ports()
}
