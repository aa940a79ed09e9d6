//! Wind history feeding the drift in the vertex stage.
//!
//! The vertex stage needs the recent *history* of wind strength, not just
//! the current value: a flake that has been falling for `t` seconds has been
//! pushed by every sample recorded during those `t` seconds. The history is
//! sampled on a fixed 10 ms clock that is independent of the frame rate.
//!
//! # Example
//!
//! ```ignore
//! use snowfall::wind::{Wind, WindDirection};
//!
//! let mut wind = Wind::new(Duration::from_millis(10), 0.05);
//! wind.nudge(WindDirection::Positive);
//! wind.update(Instant::now());
//! let uniform: &[f32] = wind.history().snapshot();
//! ```

use std::time::{Duration, Instant};

/// Number of samples kept, most recent first.
pub const WIND_HISTORY_LEN: usize = 800;

/// Change applied to the accumulator per key press.
pub const WIND_STEP: f32 = 0.05;

/// Wall-clock spacing of history samples.
pub const WIND_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Fixed-length FIFO of wind samples, newest at index 0.
///
/// Backed by a mirrored ring: every sample is stored twice, `N` slots apart,
/// so the logical window is always one contiguous slice. Ticks are O(1) and
/// [`snapshot`](Self::snapshot) borrows without copying.
#[derive(Debug, Clone)]
pub struct WindHistory {
    samples: Box<[f32]>,
    head: usize,
}

impl WindHistory {
    /// Create a history of [`WIND_HISTORY_LEN`] zeros.
    pub fn new() -> Self {
        Self {
            samples: vec![0.0; WIND_HISTORY_LEN * 2].into_boxed_slice(),
            head: 0,
        }
    }

    /// Push `impulse` to the front and drop the oldest sample.
    pub fn tick(&mut self, impulse: f32) {
        self.head = if self.head == 0 {
            WIND_HISTORY_LEN - 1
        } else {
            self.head - 1
        };
        self.samples[self.head] = impulse;
        self.samples[self.head + WIND_HISTORY_LEN] = impulse;
    }

    /// The full window, newest first. Always [`WIND_HISTORY_LEN`] long.
    #[inline]
    pub fn snapshot(&self) -> &[f32] {
        &self.samples[self.head..self.head + WIND_HISTORY_LEN]
    }

    /// Snapshot as raw bytes for a uniform upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.snapshot())
    }

    /// Most recent sample.
    #[inline]
    pub fn latest(&self) -> f32 {
        self.samples[self.head]
    }

    #[inline]
    pub fn len(&self) -> usize {
        WIND_HISTORY_LEN
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for WindHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction of a wind key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindDirection {
    Negative,
    Positive,
}

/// Running sum of every wind input since start.
///
/// Never decays: each history tick re-records the same value until the next
/// key press changes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindAccumulator {
    impulse: f32,
    step: f32,
}

impl WindAccumulator {
    pub fn new(step: f32) -> Self {
        Self { impulse: 0.0, step }
    }

    pub fn nudge(&mut self, direction: WindDirection) {
        match direction {
            WindDirection::Negative => self.impulse -= self.step,
            WindDirection::Positive => self.impulse += self.step,
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.impulse
    }
}

impl Default for WindAccumulator {
    fn default() -> Self {
        Self::new(WIND_STEP)
    }
}

/// Converts elapsed wall time into a whole number of fixed-period ticks.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
    last: Instant,
}

impl FixedInterval {
    /// Start counting from `start`. `interval` must be non-zero.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    /// Number of whole intervals that elapsed since the last call.
    ///
    /// The remainder carries over, so no time is lost between calls. An
    /// `now` earlier than the previous tick yields zero.
    pub fn due(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last);
        let ticks = (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as u64;
        if ticks > 0 {
            self.last += self.interval * u32::try_from(ticks).unwrap_or(u32::MAX);
        }
        ticks
    }
}

/// Wind state owned by the event loop: accumulator, history and its timer.
///
/// The key handler is the only writer of the accumulator and the timer the
/// only writer of the history; the render tick reads the history after all
/// due ticks were applied.
#[derive(Debug, Clone)]
pub struct Wind {
    history: WindHistory,
    accumulator: WindAccumulator,
    timer: FixedInterval,
}

impl Wind {
    pub fn new(interval: Duration, step: f32) -> Self {
        Self::starting_at(interval, step, Instant::now())
    }

    pub fn starting_at(interval: Duration, step: f32, start: Instant) -> Self {
        Self {
            history: WindHistory::new(),
            accumulator: WindAccumulator::new(step),
            timer: FixedInterval::new(interval, start),
        }
    }

    pub fn nudge(&mut self, direction: WindDirection) {
        self.accumulator.nudge(direction);
        log::debug!("wind impulse now {:.2}", self.accumulator.current());
    }

    /// Apply every history tick due at `now`. Returns the ticks applied.
    ///
    /// A stall longer than the whole window only needs one window's worth
    /// of samples: the accumulator is constant across the catch-up, and
    /// anything older would be evicted anyway.
    pub fn update(&mut self, now: Instant) -> u64 {
        let due = self.timer.due(now);
        let applied = due.min(WIND_HISTORY_LEN as u64);
        let impulse = self.accumulator.current();
        for _ in 0..applied {
            self.history.tick(impulse);
        }
        applied
    }

    pub fn history(&self) -> &WindHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zeroed() {
        let history = WindHistory::new();
        assert_eq!(history.snapshot().len(), WIND_HISTORY_LEN);
        assert!(history.snapshot().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tick_order_newest_first() {
        let mut history = WindHistory::new();
        for v in 1..=5 {
            history.tick(v as f32);
        }
        assert_eq!(&history.snapshot()[..6], &[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
        assert_eq!(history.latest(), 5.0);
    }

    #[test]
    fn test_oldest_evicted_after_full_window() {
        let mut history = WindHistory::new();
        for v in 0..(WIND_HISTORY_LEN + 3) {
            history.tick(v as f32);
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), WIND_HISTORY_LEN);
        assert_eq!(snapshot[0], (WIND_HISTORY_LEN + 2) as f32);
        assert_eq!(snapshot[WIND_HISTORY_LEN - 1], 3.0);
    }

    #[test]
    fn test_bytes_match_snapshot() {
        let mut history = WindHistory::new();
        history.tick(1.5);
        let bytes = history.as_bytes();
        assert_eq!(bytes.len(), WIND_HISTORY_LEN * 4);
        assert_eq!(&bytes[..4], &1.5f32.to_ne_bytes());
    }

    #[test]
    fn test_accumulator_never_resets() {
        let mut acc = WindAccumulator::default();
        acc.nudge(WindDirection::Positive);
        acc.nudge(WindDirection::Positive);
        acc.nudge(WindDirection::Negative);
        assert!((acc.current() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_interval_carries_remainder() {
        let start = Instant::now();
        let mut timer = FixedInterval::new(Duration::from_millis(10), start);
        assert_eq!(timer.due(start + Duration::from_millis(25)), 2);
        assert_eq!(timer.due(start + Duration::from_millis(29)), 0);
        assert_eq!(timer.due(start + Duration::from_millis(30)), 1);
    }

    #[test]
    fn test_fixed_interval_ignores_time_going_backwards() {
        let start = Instant::now() + Duration::from_secs(1);
        let mut timer = FixedInterval::new(Duration::from_millis(10), start);
        assert_eq!(timer.due(start - Duration::from_millis(500)), 0);
    }

    #[test]
    fn test_wind_update_records_stale_impulse() {
        let start = Instant::now();
        let mut wind = Wind::starting_at(WIND_TICK_INTERVAL, WIND_STEP, start);
        wind.nudge(WindDirection::Negative);
        assert_eq!(wind.update(start + Duration::from_millis(30)), 3);
        let expected = -WIND_STEP;
        assert_eq!(&wind.history().snapshot()[..4], &[expected, expected, expected, 0.0]);
    }

    #[test]
    fn test_wind_catch_up_capped_at_window() {
        let start = Instant::now();
        let mut wind = Wind::starting_at(WIND_TICK_INTERVAL, WIND_STEP, start);
        wind.nudge(WindDirection::Positive);
        let applied = wind.update(start + Duration::from_secs(60));
        assert_eq!(applied, WIND_HISTORY_LEN as u64);
        assert!(wind.history().snapshot().iter().all(|&v| v == WIND_STEP));
    }
}
