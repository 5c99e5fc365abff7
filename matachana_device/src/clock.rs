//! Simulated monotonic clock for the cycle engine.
//!
//! The engine never reads wall time for phase timing; the tick source
//! advances this clock by scaled wall time, and tests advance it directly.

use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SimClock {
    pub current_time: Duration,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            current_time: Duration::ZERO,
        }
    }

    pub fn advance(&mut self, dt: Duration) {
        self.current_time = self.current_time.saturating_add(dt);
    }

    pub fn now(&self) -> Duration {
        self.current_time
    }

    /// Seconds elapsed since `since`, saturating at zero.
    pub fn seconds_since(&self, since: Duration) -> f64 {
        self.current_time.saturating_sub(since).as_secs_f64()
    }
}
