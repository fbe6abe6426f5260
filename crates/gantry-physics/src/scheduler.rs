//! Wall-clock gate for frequency-limited simulation steps.

use std::time::Instant;

/// Decides when enough wall time has passed to run another step.
///
/// Steps have variable length: each accepted step reports the full time since
/// the previous one, which is at least `1 / frequency` but may be more.
#[derive(Debug, Clone)]
pub struct FixedStepScheduler {
    last_step: Instant,
}

impl Default for FixedStepScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedStepScheduler {
    /// Start measuring from now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start measuring from `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self { last_step: start }
    }

    /// Timestamp of the last accepted step (or of construction).
    pub fn last_step(&self) -> Instant {
        self.last_step
    }

    /// Poll against the current time. See [`Self::poll_at`].
    pub fn poll(&mut self, frequency: f32) -> Option<f32> {
        self.poll_at(frequency, Instant::now())
    }

    /// Returns the elapsed seconds if at least `1 / frequency` has passed
    /// since the last accepted step, and makes `now` the new reference.
    /// Returns `None` and leaves the reference alone otherwise.
    ///
    /// A frequency that fails [`is_valid_frequency`] is never due.
    pub fn poll_at(&mut self, frequency: f32, now: Instant) -> Option<f32> {
        if !is_valid_frequency(frequency) {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last_step);
        if elapsed.as_secs_f64() * f64::from(frequency) < 1.0 {
            return None;
        }
        self.last_step = now;
        Some(elapsed.as_secs_f32())
    }
}

/// Whether `frequency` can drive a [`FixedStepScheduler`].
pub fn is_valid_frequency(frequency: f32) -> bool {
    frequency.is_finite() && frequency > 0.0
}
