//! # Interval Limiter
//!
//! Runs periodic work at a cadence coarser than the tick rate, carrying the
//! remainder so that long-run frequency matches the interval exactly.

/// Accumulates tick deltas and fires once per elapsed interval.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntervalLimiter {
    accumulator: f32,
}

impl IntervalLimiter {
    /// Creates a limiter with nothing accumulated.
    #[must_use]
    pub const fn new() -> Self {
        Self { accumulator: 0.0 }
    }

    /// Adds `dtime` and reports whether `interval` has elapsed.
    ///
    /// Fires at most once per call; a long tick leaves the surplus for the
    /// following calls.
    pub fn step(&mut self, dtime: f32, interval: f32) -> bool {
        self.accumulator += dtime;
        if self.accumulator < interval {
            return false;
        }
        self.accumulator -= interval;
        true
    }

    /// Time accumulated towards the next firing.
    #[must_use]
    pub const fn accumulated(&self) -> f32 {
        self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_on_interval() {
        let mut limiter = IntervalLimiter::new();
        assert!(!limiter.step(0.25, 0.5));
        assert!(limiter.step(0.25, 0.5));
        assert!(!limiter.step(0.25, 0.5));
    }

    #[test]
    fn test_long_tick_carries_surplus() {
        let mut limiter = IntervalLimiter::new();
        assert!(limiter.step(1.25, 0.5));
        assert!((limiter.accumulated() - 0.75).abs() < 1e-6);
        assert!(limiter.step(0.0, 0.5));
        assert!(!limiter.step(0.0, 0.5));
    }
}
