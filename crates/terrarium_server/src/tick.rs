//! # Simulation Tick Loop
//!
//! Fixed-timestep driver for [`Environment::step`](crate::Environment::step).
//!
//! Every tick hands the simulation the same `dtime`, so cadences measured by
//! the interval limiters stay exact regardless of scheduling jitter. If the
//! host falls far behind, the backlog is dropped instead of replayed.

use std::time::{Duration, Instant};

/// Most ticks the loop will run back-to-back to catch up.
const MAX_BACKLOG_TICKS: u32 = 10;

/// Weight of the newest sample in the rolling tick-time average.
const AVERAGE_WINDOW: u64 = 16;

/// What the loop has measured so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Rolling average of the work done per tick, in microseconds.
    pub avg_tick_us: u64,
    /// Ticks whose work took longer than the tick budget.
    pub late_ticks: u64,
    /// Ticks skipped because the loop fell behind.
    pub dropped_ticks: u64,
}

/// Fixed-rate scheduler.
#[derive(Debug)]
pub struct TickLoop {
    period: Duration,
    owed: Duration,
    last_poll: Instant,
    tick_count: u64,
    stats: TickStats,
}

impl TickLoop {
    /// Creates a loop running `tick_rate` times per second. A rate of 0 is
    /// treated as 1.
    #[must_use]
    pub fn new(tick_rate: u32) -> Self {
        let period = Duration::from_secs(1) / tick_rate.max(1);
        Self {
            period,
            owed: Duration::ZERO,
            last_poll: Instant::now(),
            tick_count: 0,
            stats: TickStats::default(),
        }
    }

    /// Seconds of simulated time per tick.
    #[must_use]
    pub fn dtime(&self) -> f32 {
        self.period.as_secs_f32()
    }

    /// Runs `tick` once for every period that has elapsed since the last
    /// call, capped at the backlog limit. Returns how many ticks ran.
    pub fn run_due<F: FnMut()>(&mut self, mut tick: F) -> u32 {
        let now = Instant::now();
        self.owed += now.duration_since(self.last_poll);
        self.last_poll = now;

        let cap = self.period * MAX_BACKLOG_TICKS;
        if self.owed > cap {
            let skipped = (self.owed - cap).as_nanos() / self.period.as_nanos().max(1);
            self.stats.dropped_ticks += u64::try_from(skipped).unwrap_or(u64::MAX);
            tracing::warn!("simulation fell behind; skipping {} ticks", skipped);
            self.owed = cap;
        }

        let mut ran = 0;
        while self.owed >= self.period {
            self.owed -= self.period;
            let started = Instant::now();
            tick();
            self.record(started.elapsed());
            ran += 1;
        }
        ran
    }

    fn record(&mut self, work: Duration) {
        let us = u64::try_from(work.as_micros()).unwrap_or(u64::MAX);
        self.tick_count += 1;
        self.stats.avg_tick_us = if self.tick_count == 1 {
            us
        } else {
            (self.stats.avg_tick_us.saturating_mul(AVERAGE_WINDOW - 1) + us) / AVERAGE_WINDOW
        };
        if work > self.period {
            self.stats.late_ticks += 1;
        }
    }

    /// Sleeps until the next tick is due.
    pub fn wait_for_next_tick(&self) {
        let pending = self.owed + self.last_poll.elapsed();
        if let Some(rest) = self.period.checked_sub(pending) {
            std::thread::sleep(rest);
        }
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Timing measurements.
    #[must_use]
    pub const fn stats(&self) -> TickStats {
        self.stats
    }
}
