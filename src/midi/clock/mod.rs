//! MIDI clock pulse scheduler.
//!
//! A dedicated thread turns the published tempo into a 24 PPQN pulse train,
//! emits Start/Stop/Continue on transport edges and sends Song Position
//! Pointer updates whenever the render side requests one.
pub mod core;

use crate::midi::{MidiMessage, MidiOut};
use crate::state::SharedTransport;
use self::core::{secs_to_ticks, PulseSchedule, PulseStep};
use log::{debug, info, trace, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sleep granularity while stopped or idle.
pub const IDLE_SLEEP_SECS: f64 = 0.001;

/// Portion of a wait that is spun instead of slept.
pub const SPIN_MARGIN_SECS: f64 = 0.002;

/// Time source for the scheduler, in ticks of `frequency()` per second.
pub trait Timer: Send {
    fn frequency(&self) -> u64;

    fn now(&self) -> u64;

    fn sleep(&self, ticks: u64);

    /// Busy-waits until `deadline`.
    fn spin_until(&self, deadline: u64) {
        while self.now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// Nanosecond timer over `Instant`.
pub struct MonotonicTimer {
    origin: Instant,
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Timer for MonotonicTimer {
    fn frequency(&self) -> u64 {
        1_000_000_000
    }

    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn sleep(&self, ticks: u64) {
        thread::sleep(Duration::from_nanos(ticks));
    }
}

/// One scheduler iteration at a time; the thread just calls `iterate` in a
/// loop. Tests drive it directly with a simulated timer.
pub struct ClockRunner<T: Timer> {
    transport: SharedTransport,
    out: MidiOut,
    timer: T,
    schedule: PulseSchedule,
    was_playing: bool,
    pulses: u64,
    idle_ticks: u64,
    spin_margin: u64,
}

impl<T: Timer> ClockRunner<T> {
    pub fn new(transport: SharedTransport, out: MidiOut, timer: T) -> Self {
        let frequency = timer.frequency();
        Self {
            transport,
            out,
            schedule: PulseSchedule::new(frequency),
            was_playing: false,
            pulses: 0,
            idle_ticks: secs_to_ticks(IDLE_SLEEP_SECS, frequency).max(1),
            spin_margin: secs_to_ticks(SPIN_MARGIN_SECS, frequency),
            timer,
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn schedule(&self) -> &PulseSchedule {
        &self.schedule
    }

    /// Clock pulses emitted since this runner was created.
    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    pub fn iterate(&mut self) {
        if let Some(beats) = self.transport.take_song_position_request() {
            debug!("Sending song position {}", beats);
            self.out.transmit(MidiMessage::SongPosition(beats));
        }

        let playing = self.transport.is_playing();
        if playing != self.was_playing {
            self.transport_edge(playing);
        }

        if !playing {
            self.schedule.rearm();
            self.timer.sleep(self.idle_ticks);
            return;
        }

        let now = self.timer.now();
        match self.schedule.poll(self.transport.tempo(), now) {
            PulseStep::Emit => {
                self.out.transmit(MidiMessage::Clock);
                self.pulses += 1;
                trace!("Clock pulse {}", self.pulses);
            }
            PulseStep::Wait(remaining) => {
                if remaining > self.spin_margin {
                    self.timer.sleep(remaining - self.spin_margin);
                } else {
                    self.timer.spin_until(now + remaining);
                }
            }
            PulseStep::Resynced { late_by } => {
                let late_ms = late_by as f64 * 1000.0 / self.schedule.frequency() as f64;
                warn!("Clock fell {:.1} ms behind, deadline rebased", late_ms);
            }
            PulseStep::Idle => {
                trace!("Non-positive tempo, no pulse this iteration");
                self.timer.sleep(self.idle_ticks);
            }
        }
    }

    fn transport_edge(&mut self, playing: bool) {
        self.was_playing = playing;
        self.schedule.reset();
        if playing {
            if self.transport.song_position() == 0 {
                info!("Transport started");
                self.out.transmit(MidiMessage::Start);
            } else {
                info!(
                    "Transport continued at beat {}",
                    self.transport.song_position()
                );
                self.out.transmit(MidiMessage::Continue);
            }
        } else {
            info!("Transport stopped");
            self.out.transmit(MidiMessage::Stop);
        }
    }
}

/// Owns the scheduler thread.
pub struct ClockScheduler {
    active: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Default for ClockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockScheduler {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    pub fn start<T: Timer + 'static>(&mut self, mut runner: ClockRunner<T>) {
        if self.thread_handle.is_some() {
            return; // Already running
        }

        let active = Arc::clone(&self.active);
        self.active.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("midi-clock".to_string())
            .spawn(move || {
                info!("Clock scheduler thread started");
                while active.load(Ordering::SeqCst) {
                    runner.iterate();
                }
                info!("Clock scheduler thread exiting");
            });

        match spawned {
            Ok(handle) => self.thread_handle = Some(handle),
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                warn!("Failed to spawn clock scheduler thread: {}", e);
            }
        }
    }

    /// Clears the active flag and joins the thread.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ClockScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
