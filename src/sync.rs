// sync.rs

use crate::control::ControlRouter;
use crate::midi::channels::ChannelError;
use crate::midi::{
    ClockRunner, ClockScheduler, InstrumentRoute, MidiEngine, MidiOut, MonotonicTimer,
    OutputChannels, Timer, TrackerNote,
};
use crate::protocol::DeviceId;
use crate::state::{SharedTransport, TransportState};
use log::info;

/// The MIDI sync subsystem as seen by the host.
///
/// Owns the shared transport values, the output handle and the clock
/// thread. The render side calls [`publish`](Self::publish) once per audio
/// buffer and [`note_event`](Self::note_event) from its note hook.
pub struct MidiSync {
    transport: SharedTransport,
    out: MidiOut,
    clock: ClockScheduler,
    channels: OutputChannels,
    router: ControlRouter,
}

impl MidiSync {
    pub fn new(device_id: DeviceId, channel_count: usize) -> Result<Self, ChannelError> {
        let out = MidiOut::new();
        Ok(MidiSync {
            transport: TransportState::shared(),
            channels: OutputChannels::new(channel_count)?,
            router: ControlRouter::new(device_id, out.clone()),
            clock: ClockScheduler::new(),
            out,
        })
    }

    pub fn attach_output<E: MidiEngine + 'static>(&self, engine: E) {
        self.out.attach(engine);
    }

    pub fn output(&self) -> &MidiOut {
        &self.out
    }

    pub fn transport(&self) -> SharedTransport {
        self.transport.clone()
    }

    pub fn router(&self) -> &ControlRouter {
        &self.router
    }

    pub fn channels(&self) -> &OutputChannels {
        &self.channels
    }

    pub fn clock_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn start_clock(&mut self) {
        self.start_clock_with(MonotonicTimer::new());
    }

    pub fn start_clock_with<T: Timer + 'static>(&mut self, timer: T) {
        let runner = ClockRunner::new(self.transport.clone(), self.out.clone(), timer);
        self.clock.start(runner);
    }

    /// Stops the clock thread, releases held notes and drops the device.
    pub fn shutdown(&mut self) {
        self.clock.stop();
        let mut out = self.out.clone();
        self.channels.all_notes_off(&mut out);
        self.out.detach();
        info!("MIDI sync shut down");
    }

    /// Per-buffer tempo and position publication.
    pub fn publish(&self, bpm: f64, playing: bool, midi_beats: u32) {
        self.transport.publish(bpm, playing, midi_beats);
    }

    /// Asks the clock thread to send a Song Position Pointer, e.g. after a
    /// jump.
    pub fn request_song_position(&self, midi_beats: u32) {
        self.transport.request_song_position(midi_beats);
    }

    pub fn set_route(
        &mut self,
        instrument: u8,
        route: InstrumentRoute,
    ) -> Result<(), ChannelError> {
        self.channels.set_route(instrument, route)
    }

    pub fn note_event(
        &mut self,
        tracker_channel: usize,
        note: TrackerNote,
        instrument: u8,
        volume: u8,
    ) {
        let mut out = self.out.clone();
        self.channels
            .note_event(&mut out, tracker_channel, note, instrument, volume);
    }

    pub fn order_boundary(&mut self) {
        self.channels.on_order_boundary();
    }

    pub fn loop_retrigger(&mut self) {
        self.channels.on_loop_retrigger();
    }

    pub fn stop_notes(&mut self) {
        let mut out = self.out.clone();
        self.channels.all_notes_off(&mut out);
    }
}

impl Drop for MidiSync {
    fn drop(&mut self) {
        self.clock.stop();
    }
}
