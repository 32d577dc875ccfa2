//! Sample Pacing and Snapshot Cadence
//!
//! The producer loop does not run at a fixed tick; on every wake-up it
//! asks the pacer how many samples are due from the monotonic clock,
//! processes exactly that many, and separately whether a snapshot publish
//! is due. The per-tick sample count is capped so a long stall (debugger,
//! suspend) produces one bounded burst instead of an unbounded catch-up;
//! real time is allowed to drift in that case.
//!
//! Time comes from a [`Clock`] trait with a monotonic system
//! implementation and a manually advanced mock for deterministic tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Hard cap on samples produced per tick.
pub const MAX_SAMPLES_PER_TICK: usize = 2000;

/// Source of monotonic time in nanoseconds.
pub trait Clock: Send + Sync {
    /// Nanoseconds since the clock's epoch.
    fn now_ns(&self) -> u64;
}

/// Monotonic system clock over [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// Mock clock for tests, advanced by hand.
#[derive(Debug, Default)]
pub struct MockClock {
    current_ns: AtomicU64,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.current_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute time in nanoseconds.
    pub fn set_ns(&self, ns: u64) {
        self.current_ns.store(ns, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ns(&self) -> u64 {
        self.current_ns.load(Ordering::SeqCst)
    }
}

/// Tracks how many samples are due and when to publish the next snapshot.
#[derive(Debug)]
pub struct Pacer {
    sample_rate: f64,
    snapshot_interval_ns: u64,
    last_sample_ns: u64,
    last_publish_ns: u64,
}

impl Pacer {
    /// Create a pacer anchored at `now_ns`.
    pub fn new(sample_rate: f64, snapshot_rate: f64, now_ns: u64) -> Self {
        Self {
            sample_rate,
            snapshot_interval_ns: (1e9 / snapshot_rate) as u64,
            last_sample_ns: now_ns,
            last_publish_ns: now_ns,
        }
    }

    /// Samples whose theoretical timestamps have elapsed since the last
    /// tick, capped at [`MAX_SAMPLES_PER_TICK`]. The anchor always moves
    /// to `now_ns`, so a backward or stalled clock simply produces zero.
    pub fn due_samples(&mut self, now_ns: u64) -> usize {
        let due = if now_ns > self.last_sample_ns {
            let elapsed_s = (now_ns - self.last_sample_ns) as f64 / 1e9;
            (elapsed_s * self.sample_rate) as usize
        } else {
            0
        };
        self.last_sample_ns = now_ns;
        due.min(MAX_SAMPLES_PER_TICK)
    }

    /// Whether a snapshot publish is due; advances the publish anchor when
    /// it is.
    pub fn should_publish(&mut self, now_ns: u64) -> bool {
        if now_ns >= self.last_publish_ns + self.snapshot_interval_ns {
            self.last_publish_ns = now_ns;
            true
        } else {
            false
        }
    }

    /// Re-anchor both trackers, e.g. after a restart.
    pub fn reset(&mut self, now_ns: u64) {
        self.last_sample_ns = now_ns;
        self.last_publish_ns = now_ns;
    }
}
