//! Per-frame orchestration.
//!
//! The loop has two states. While **Waiting** for the snowflake texture it
//! only keeps time; once **Active** every tick pushes the frame uniforms and
//! issues exactly one indexed draw. The transition happens once and is never
//! reversed. Rescheduling is the caller's job (the event loop requests the
//! next redraw after every tick, whatever the state).

use glam::Mat4;

use crate::camera::CameraController;
use crate::time::SimClock;
use crate::wind::WindHistory;

/// Uniform values for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Simulated seconds.
    pub time: f32,
    /// Wind history, newest first.
    pub wind_history: &'a [f32],
    pub view: Mat4,
}

/// Something that can upload a frame's uniforms and draw every particle.
pub trait FrameSink {
    type Error;

    /// Clear, upload `frame`, and issue one indexed draw of all particles.
    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Resources not ready; ticks only advance the clock.
    Waiting,
    /// Full frames are drawn.
    Active,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped,
    Drawn,
}

/// Render loop state machine.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    state: LoopState,
    clock: SimClock,
    draws: u64,
}

impl RenderLoop {
    /// Start in [`LoopState::Waiting`] with the clock at `initial_time`.
    pub fn new(initial_time: f32) -> Self {
        Self {
            state: LoopState::Waiting,
            clock: SimClock::new(initial_time),
            draws: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LoopState::Active
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Draw calls issued so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Resources are ready. Returns `true` only for the first call.
    pub fn activate(&mut self) -> bool {
        if self.state == LoopState::Active {
            return false;
        }
        self.state = LoopState::Active;
        log::debug!(
            "render loop active at t={:.3}s after {} waiting ticks",
            self.clock.elapsed(),
            self.clock.frame()
        );
        true
    }

    /// Run one frame.
    ///
    /// `delta` is the measured wall-clock time since the previous tick and
    /// is always folded into the clock. Wind ticks that ran before this call
    /// are visible in the uploaded history.
    pub fn tick<S: FrameSink>(
        &mut self,
        delta: f32,
        wind: &WindHistory,
        camera: &CameraController,
        sink: &mut S,
    ) -> Result<TickOutcome, S::Error> {
        let time = self.clock.advance(delta);

        if self.state == LoopState::Waiting {
            return Ok(TickOutcome::Skipped);
        }

        let frame = Frame {
            time,
            wind_history: wind.snapshot(),
            view: camera.view_matrix(),
        };
        sink.draw(&frame)?;
        self.draws += 1;
        Ok(TickOutcome::Drawn)
    }
}
