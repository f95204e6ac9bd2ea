//! Time Management
//!
//! Time-step model supporting:
//! - Variable simulation step (the frame's delta is fed straight in)
//! - Fixed-step simulation through an accumulator

/// Upper bound applied to a single frame before it reaches the simulation.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Delta time wrapper for type safety
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaTime(pub f64);

impl DeltaTime {
    /// Create a new delta time from seconds
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Get the delta time in seconds
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Get the delta time as f32, which is what the simulation consumes
    pub fn as_secs_f32(&self) -> f32 {
        self.0 as f32
    }
}

impl Default for DeltaTime {
    fn default() -> Self {
        Self(1.0 / 60.0)
    }
}

/// Fixed time step configuration
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeStep {
    /// Fixed timestep in seconds
    pub step: f64,
    /// Maximum number of fixed updates per frame (to prevent spiral of death)
    pub max_updates: u32,
}

impl Default for FixedTimeStep {
    fn default() -> Self {
        Self {
            step: 1.0 / 60.0, // 60 Hz
            max_updates: 8,
        }
    }
}

impl FixedTimeStep {
    /// Create a new fixed time step with the given frequency
    pub fn from_hz(hz: f64) -> Self {
        Self {
            step: 1.0 / hz,
            max_updates: 8,
        }
    }

    /// Set the maximum number of updates per frame
    pub fn with_max_updates(mut self, max: u32) -> Self {
        self.max_updates = max;
        self
    }
}

/// Accumulates variable frame time and hands it out in fixed steps.
#[derive(Debug, Clone)]
pub struct StepAccumulator {
    config: FixedTimeStep,
    accumulator: f64,
    total_steps: u64,
}

impl StepAccumulator {
    pub fn new(config: FixedTimeStep) -> Self {
        Self {
            config,
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    pub fn config(&self) -> FixedTimeStep {
        self.config
    }

    /// Add a frame's worth of time and return how many fixed steps to run.
    ///
    /// Frames longer than [`MAX_FRAME_TIME`] are clamped, and time beyond
    /// `max_updates` steps is dropped rather than carried into the next frame.
    pub fn push(&mut self, frame_time: DeltaTime) -> u32 {
        let clamped = frame_time.as_secs().clamp(0.0, MAX_FRAME_TIME);
        if clamped < frame_time.as_secs() {
            log::debug!(
                "Clamping frame time {:.3}s to {:.3}s",
                frame_time.as_secs(),
                clamped
            );
        }
        self.accumulator += clamped;

        let step = self.config.step;
        if step <= 0.0 {
            return 0;
        }

        let mut steps = 0;
        while self.accumulator >= step && steps < self.config.max_updates {
            self.accumulator -= step;
            steps += 1;
        }

        if steps == self.config.max_updates && self.accumulator >= step {
            log::warn!(
                "Simulation fell behind; dropping {:.3}s of accumulated time",
                self.accumulator
            );
            self.accumulator %= step;
        }

        self.total_steps += u64::from(steps);
        steps
    }

    /// Fraction of a step left over, for interpolating between states
    pub fn interpolation(&self) -> f64 {
        if self.config.step <= 0.0 {
            return 0.0;
        }
        (self.accumulator / self.config.step).clamp(0.0, 1.0)
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// The fixed step as the simulation consumes it
    pub fn step(&self) -> DeltaTime {
        DeltaTime(self.config.step)
    }
}

impl Default for StepAccumulator {
    fn default() -> Self {
        Self::new(FixedTimeStep::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_time() {
        let dt = DeltaTime::from_secs(0.016);
        assert!((dt.as_secs() - 0.016).abs() < 0.0001);
        assert!((dt.as_secs_f32() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_time_step() {
        let fts = FixedTimeStep::from_hz(60.0);
        assert!((fts.step - 1.0 / 60.0).abs() < 0.0001);
        assert_eq!(fts.with_max_updates(3).max_updates, 3);
    }

    #[test]
    fn test_accumulator_steps() {
        let mut acc = StepAccumulator::new(FixedTimeStep::from_hz(60.0));

        // Just over three steps' worth of time.
        let steps = acc.push(DeltaTime::from_secs(3.5 / 60.0));
        assert_eq!(steps, 3);
        assert!((acc.interpolation() - 0.5).abs() < 1e-6);

        // The remainder carries into the next frame.
        assert_eq!(acc.push(DeltaTime::from_secs(0.5 / 60.0)), 1);
        assert_eq!(acc.total_steps(), 4);
    }

    #[test]
    fn test_accumulator_caps_updates() {
        let mut acc = StepAccumulator::new(FixedTimeStep::from_hz(60.0).with_max_updates(4));

        let steps = acc.push(DeltaTime::from_secs(0.2));
        assert_eq!(steps, 4);
        // Excess time is dropped, not replayed next frame.
        assert!(acc.interpolation() < 1.0);
        assert!(acc.push(DeltaTime::from_secs(0.0)) <= 1);
    }

    #[test]
    fn test_accumulator_clamps_long_frames() {
        let mut acc = StepAccumulator::new(FixedTimeStep::from_hz(10.0).with_max_updates(100));
        assert_eq!(acc.push(DeltaTime::from_secs(10.0)), 2);
    }
}
