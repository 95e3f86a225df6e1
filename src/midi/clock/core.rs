//! Pure pulse-timing logic. Nothing in here touches a clock or a device;
//! the caller supplies `now` in timer ticks.

use crate::config::PULSES_PER_QUARTER;

/// Moving-average window for the tempo filter.
pub const SMOOTHING_WINDOW: usize = 8;

/// Raw tempo movement that forces a filter update.
pub const TEMPO_EPSILON_BPM: f64 = 0.05;

/// Filter refresh period when the raw tempo is steady.
pub const TEMPO_REFRESH_SECS: f64 = 0.100;

/// How far behind the scheduler may fall before the deadline is rebased.
pub const RESYNC_THRESHOLD_SECS: f64 = 0.010;

pub fn secs_to_ticks(secs: f64, frequency: u64) -> u64 {
    (secs * frequency as f64).round() as u64
}

/// Timer ticks between two clock pulses at `bpm`.
pub fn ticks_per_pulse(bpm: f64, frequency: u64) -> u64 {
    let pulse_interval_secs = 60.0 / bpm / PULSES_PER_QUARTER as f64;
    secs_to_ticks(pulse_interval_secs, frequency).max(1)
}

/// 8-sample moving average over the published tempo, refreshed only when
/// the raw value moves or the refresh period has elapsed.
#[derive(Debug, Clone)]
pub struct TempoSmoother {
    samples: [f64; SMOOTHING_WINDOW],
    next: usize,
    last_raw: Option<f64>,
    last_update: u64,
    smoothed: f64,
}

impl Default for TempoSmoother {
    fn default() -> Self {
        Self {
            samples: [0.0; SMOOTHING_WINDOW],
            next: 0,
            last_raw: None,
            last_update: 0,
            smoothed: 0.0,
        }
    }
}

impl TempoSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets history; the next update primes the whole window.
    pub fn reset(&mut self) {
        self.last_raw = None;
    }

    pub fn smoothed(&self) -> Option<f64> {
        self.last_raw.map(|_| self.smoothed)
    }

    pub fn update(&mut self, raw_bpm: f64, now: u64, frequency: u64) -> f64 {
        let Some(last_raw) = self.last_raw else {
            self.samples = [raw_bpm; SMOOTHING_WINDOW];
            self.next = 0;
            self.smoothed = raw_bpm;
            self.last_raw = Some(raw_bpm);
            self.last_update = now;
            return self.smoothed;
        };

        let moved = (raw_bpm - last_raw).abs() > TEMPO_EPSILON_BPM;
        let stale =
            now.saturating_sub(self.last_update) > secs_to_ticks(TEMPO_REFRESH_SECS, frequency);
        if moved || stale {
            self.samples[self.next] = raw_bpm;
            self.next = (self.next + 1) % SMOOTHING_WINDOW;
            self.smoothed = self.samples.iter().sum::<f64>() / SMOOTHING_WINDOW as f64;
            self.last_raw = Some(raw_bpm);
            self.last_update = now;
        }
        self.smoothed
    }
}

/// Outcome of one scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseStep {
    /// A pulse is due now; the deadline has already been advanced.
    Emit,
    /// The next pulse is this many ticks away.
    Wait(u64),
    /// The scheduler was too late; the deadline now sits one interval ahead.
    Resynced { late_by: u64 },
    /// Tempo was not positive; nothing is scheduled.
    Idle,
}

/// Deadline bookkeeping for the pulse train.
///
/// The deadline advances by whole pulse intervals. It is rebased on `now`
/// only when the schedule is re-armed (transport edge, idle) or when the
/// scheduler has fallen past the resync threshold.
#[derive(Debug, Clone)]
pub struct PulseSchedule {
    frequency: u64,
    resync_after: u64,
    next_deadline: Option<u64>,
    smoother: TempoSmoother,
}

impl PulseSchedule {
    pub fn new(frequency: u64) -> Self {
        Self {
            frequency,
            resync_after: secs_to_ticks(RESYNC_THRESHOLD_SECS, frequency),
            next_deadline: None,
            smoother: TempoSmoother::new(),
        }
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.next_deadline
    }

    pub fn smoothed_tempo(&self) -> Option<f64> {
        self.smoother.smoothed()
    }

    /// Drops the deadline so the next poll starts a fresh pulse train.
    pub fn rearm(&mut self) {
        self.next_deadline = None;
    }

    /// Re-arms and also restarts the tempo filter.
    pub fn reset(&mut self) {
        self.rearm();
        self.smoother.reset();
    }

    pub fn poll(&mut self, raw_bpm: f64, now: u64) -> PulseStep {
        // NaN falls through here as well
        if !(raw_bpm > 0.0) {
            return PulseStep::Idle;
        }

        let bpm = self.smoother.update(raw_bpm, now, self.frequency);
        let interval = ticks_per_pulse(bpm, self.frequency);
        let deadline = *self.next_deadline.get_or_insert(now);

        if now > deadline.saturating_add(self.resync_after) {
            self.next_deadline = Some(now + interval);
            return PulseStep::Resynced {
                late_by: now - deadline,
            };
        }

        if now < deadline {
            return PulseStep::Wait(deadline - now);
        }

        self.next_deadline = Some(deadline + interval);
        PulseStep::Emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NANOS: u64 = 1_000_000_000;

    #[test]
    fn test_ticks_per_pulse_at_120_bpm() {
        // 500 ms per beat / 24
        assert_eq!(ticks_per_pulse(120.0, NANOS), 20_833_333);
    }

    #[test]
    fn test_smoother_primes_on_first_value() {
        let mut smoother = TempoSmoother::new();
        assert_eq!(smoother.smoothed(), None);
        assert_eq!(smoother.update(140.0, 0, NANOS), 140.0);
    }

    #[test]
    fn test_smoother_ignores_small_moves_within_refresh() {
        let mut smoother = TempoSmoother::new();
        smoother.update(120.0, 0, NANOS);
        let smoothed = smoother.update(120.04, 10_000_000, NANOS);
        assert_eq!(smoothed, 120.0);
    }

    #[test]
    fn test_smoother_averages_large_moves() {
        let mut smoother = TempoSmoother::new();
        smoother.update(120.0, 0, NANOS);
        let smoothed = smoother.update(128.0, 1_000, NANOS);
        assert!((smoothed - 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_deadline_advances_from_previous_deadline() {
        let mut schedule = PulseSchedule::new(NANOS);
        let interval = ticks_per_pulse(120.0, NANOS);

        assert_eq!(schedule.poll(120.0, 0), PulseStep::Emit);
        // Woke up 1 ms late; the next deadline must not absorb the lateness
        assert_eq!(schedule.poll(120.0, interval + 1_000_000), PulseStep::Emit);
        assert_eq!(schedule.next_deadline(), Some(2 * interval));
    }

    #[test]
    fn test_reset_restarts_tempo_filter() {
        let mut schedule = PulseSchedule::new(NANOS);
        assert_eq!(schedule.smoothed_tempo(), None);
        schedule.poll(140.0, 0);
        assert_eq!(schedule.smoothed_tempo(), Some(140.0));

        // Re-arming keeps the filter, a reset clears it
        schedule.rearm();
        assert_eq!(schedule.smoothed_tempo(), Some(140.0));
        schedule.reset();
        assert_eq!(schedule.smoothed_tempo(), None);
        assert_eq!(schedule.next_deadline(), None);
    }

    #[test]
    fn test_non_positive_tempo_is_idle() {
        let mut schedule = PulseSchedule::new(NANOS);
        assert_eq!(schedule.poll(0.0, 0), PulseStep::Idle);
        assert_eq!(schedule.poll(-3.0, 0), PulseStep::Idle);
        assert_eq!(schedule.poll(f64::NAN, 0), PulseStep::Idle);
        assert_eq!(schedule.next_deadline(), None);
    }

    #[test]
    fn test_large_lateness_resyncs_instead_of_bursting() {
        let mut schedule = PulseSchedule::new(NANOS);
        let interval = ticks_per_pulse(120.0, NANOS);
        assert_eq!(schedule.poll(120.0, 0), PulseStep::Emit);

        let stalled_until = interval + 50_000_000;
        assert_eq!(
            schedule.poll(120.0, stalled_until),
            PulseStep::Resynced { late_by: 50_000_000 }
        );
        assert_eq!(schedule.next_deadline(), Some(stalled_until + interval));
        assert_eq!(
            schedule.poll(120.0, stalled_until),
            PulseStep::Wait(interval)
        );
    }
}
