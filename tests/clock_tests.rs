use rowsyncrs::config::PULSES_PER_QUARTER;
use rowsyncrs::midi::clock::core::ticks_per_pulse;
use rowsyncrs::midi::{ClockRunner, MidiMessage, MidiOut, MockMidiEngine, Timer};
use rowsyncrs::state::{SharedTransport, TransportState};
use std::cell::Cell;

const NANOS: u64 = 1_000_000_000;
const MILLIS: u64 = 1_000_000;

/// Simulated time. Sleeps overshoot or undershoot by up to `jitter` and
/// spinning wakes up to `jitter` past the deadline, both drawn from a
/// fixed-seed LCG.
struct SimulatedTimer {
    now: Cell<u64>,
    seed: Cell<u64>,
    jitter: u64,
}

impl SimulatedTimer {
    fn new(jitter: u64) -> Self {
        Self {
            now: Cell::new(0),
            seed: Cell::new(0x2545_F491_4F6C_DD1D),
            jitter,
        }
    }

    fn advance(&self, ticks: u64) {
        self.now.set(self.now.get() + ticks);
    }

    fn next_random(&self) -> u64 {
        let seed = self
            .seed
            .get()
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.seed.set(seed);
        seed >> 33
    }

    fn next_jitter(&self) -> i64 {
        if self.jitter == 0 {
            return 0;
        }
        let span = 2 * self.jitter + 1;
        (self.next_random() % span) as i64 - self.jitter as i64
    }

    fn next_lateness(&self) -> u64 {
        if self.jitter == 0 {
            return 0;
        }
        self.next_random() % (self.jitter + 1)
    }
}

impl Timer for SimulatedTimer {
    fn frequency(&self) -> u64 {
        NANOS
    }

    fn now(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, ticks: u64) {
        let target = self.now.get() as i64 + ticks as i64 + self.next_jitter();
        // Time never runs backwards
        self.now.set(target.max(self.now.get() as i64) as u64);
    }

    fn spin_until(&self, deadline: u64) {
        self.now.set(self.now.get().max(deadline) + self.next_lateness());
    }
}

fn setup(jitter: u64) -> (SharedTransport, MockMidiEngine, ClockRunner<SimulatedTimer>) {
    let transport = TransportState::shared();
    let mock = MockMidiEngine::new();
    let out = MidiOut::with_device(mock.clone());
    let runner = ClockRunner::new(transport.clone(), out, SimulatedTimer::new(jitter));
    (transport, mock, runner)
}

fn run_until(runner: &mut ClockRunner<SimulatedTimer>, end: u64) {
    while runner.timer().now() < end {
        runner.iterate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_drift_under_jitter() {
        let (transport, mock, mut runner) = setup(2 * MILLIS);
        transport.publish(120.0, true, 0);

        // 417 quarter notes is just over 10,000 pulses
        let quarters = 417;
        let interval = ticks_per_pulse(120.0, NANOS);
        let end = quarters * PULSES_PER_QUARTER * interval;
        run_until(&mut runner, end);

        // Every wake-up lands late, so a deadline rebased on `now` would
        // lose about one pulse per twenty here
        let expected = quarters * PULSES_PER_QUARTER;
        let emitted = runner.pulses();
        assert!(
            emitted.abs_diff(expected) <= 1,
            "expected {} pulses, got {}",
            expected,
            emitted
        );
        assert_eq!(mock.count(&MidiMessage::Clock) as u64, emitted);
    }

    #[test]
    fn test_stall_resyncs_instead_of_bursting() {
        let (transport, mock, mut runner) = setup(0);
        transport.publish(120.0, true, 0);
        let interval = ticks_per_pulse(120.0, NANOS);

        run_until(&mut runner, 10 * interval);
        let before = runner.pulses();

        // Simulate the thread being blocked for 50 ms
        runner.timer().advance(50 * MILLIS);
        let resumed_at = runner.timer().now();
        runner.iterate();

        assert_eq!(runner.pulses(), before, "a late scheduler must not emit");
        assert_eq!(
            runner.schedule().next_deadline(),
            Some(resumed_at + interval)
        );

        // Exactly one pulse in the following interval, no catch-up burst
        run_until(&mut runner, resumed_at + interval);
        runner.iterate();
        assert_eq!(runner.pulses(), before + 1);
        assert_eq!(mock.count(&MidiMessage::Clock) as u64, before + 1);
    }

    #[test]
    fn test_start_from_top_then_stop() {
        let (transport, mock, mut runner) = setup(0);
        transport.publish(120.0, true, 0);
        runner.iterate();

        let sent = mock.take_sent();
        assert_eq!(sent, vec![MidiMessage::Start, MidiMessage::Clock]);

        transport.set_playing(false);
        runner.iterate();
        assert_eq!(mock.take_sent(), vec![MidiMessage::Stop]);

        // Stopped: no pulses however long we wait
        let now = runner.timer().now();
        run_until(&mut runner, now + 100 * MILLIS);
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_continue_from_mid_song() {
        let (transport, mock, mut runner) = setup(0);
        transport.publish(120.0, true, 32);
        runner.iterate();
        assert_eq!(mock.sent()[0], MidiMessage::Continue);
    }

    #[test]
    fn test_song_position_sent_while_stopped() {
        let (transport, mock, mut runner) = setup(0);
        transport.request_song_position(0x0281);
        runner.iterate();
        assert_eq!(mock.sent(), vec![MidiMessage::SongPosition(0x0281)]);
        assert_eq!(
            MidiMessage::SongPosition(0x0281).to_bytes(),
            vec![0xF2, 0x01, 0x05]
        );
    }

    #[test]
    fn test_song_position_precedes_continue() {
        let (transport, mock, mut runner) = setup(0);
        transport.request_song_position(64);
        transport.set_playing(true);
        runner.iterate();
        let sent = mock.sent();
        assert_eq!(sent[0], MidiMessage::SongPosition(64));
        assert_eq!(sent[1], MidiMessage::Continue);
    }

    #[test]
    fn test_zero_tempo_emits_no_pulses() {
        let (transport, mock, mut runner) = setup(0);
        transport.publish(0.0, true, 0);
        run_until(&mut runner, 100 * MILLIS);
        assert_eq!(mock.sent(), vec![MidiMessage::Start]);
        assert_eq!(runner.pulses(), 0);
    }

    #[test]
    fn test_pulse_rate_follows_tempo() {
        let (transport, _mock, mut runner) = setup(0);
        transport.publish(60.0, true, 0);
        // One second at 60 BPM is one quarter note
        run_until(&mut runner, NANOS);
        assert!(runner.pulses().abs_diff(PULSES_PER_QUARTER) <= 1);
    }
}
