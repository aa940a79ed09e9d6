//! Simulated time for the snowfall.
//!
//! [`SimClock`] is the accumulator the vertex stage reads as `time`; it only
//! ever moves forward. [`FrameTimer`] measures wall-clock deltas between
//! redraws and feeds them into the clock.
//!
//! # Example
//!
//! ```ignore
//! use snowfall::time::{FrameTimer, SimClock};
//!
//! let mut clock = SimClock::new(3.0);
//! let mut timer = FrameTimer::new();
//!
//! // In the redraw handler:
//! clock.advance(timer.lap());
//! println!("t = {:.2}s after {} frames", clock.elapsed(), clock.frame());
//! ```

use std::time::Instant;

/// Monotonically non-decreasing simulated time in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    /// Accumulated in f64 so long sessions do not lose sub-frame precision.
    elapsed: f64,
    /// Number of advances applied.
    frame_count: u64,
}

impl SimClock {
    /// Create a clock reading `start` seconds.
    pub fn new(start: f32) -> Self {
        Self {
            elapsed: start.max(0.0) as f64,
            frame_count: 0,
        }
    }

    /// Add a measured delta.
    ///
    /// Negative or non-finite deltas from clock anomalies are treated as
    /// zero, so the clock never moves backwards.
    pub fn advance(&mut self, delta: f32) -> f32 {
        if delta.is_finite() && delta > 0.0 {
            self.elapsed += delta as f64;
        }
        self.frame_count += 1;
        self.elapsed()
    }

    /// Total simulated seconds.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }

    /// Total advances since creation.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Wall-clock delta between successive frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimer {
    last_frame: Instant,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self { last_frame: start }
    }

    /// Seconds since the previous lap, measured now.
    pub fn lap(&mut self) -> f32 {
        self.lap_at(Instant::now())
    }

    /// Seconds between the previous lap and `now`. Zero if `now` is earlier.
    pub fn lap_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_frame).as_secs_f32();
        if now > self.last_frame {
            self.last_frame = now;
        }
        delta
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
