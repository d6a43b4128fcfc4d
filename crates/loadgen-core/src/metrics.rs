//! Per-role run metrics.

use crate::report::RoleSummary;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Stand-in deadline for durations that overflow [`Instant`] (roughly 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// The two traffic roles of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => write!(f, "Producer"),
            Role::Consumer => write!(f, "Consumer"),
        }
    }
}

/// Counters of one role for one run.
///
/// Owned by the role's task. Counters are atomic because producer delivery
/// reports arrive on the client's background thread, out of submission order.
#[derive(Debug)]
pub struct RunMetrics {
    role: Role,
    started: Instant,
    processed: AtomicU64,
    errors: AtomicU64,
    bytes: AtomicU64,
    delivery_acks: AtomicU64,
    delivery_failures: AtomicU64,
    finished: OnceLock<Duration>,
}

impl RunMetrics {
    /// Start the clock for `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            started: Instant::now(),
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            delivery_acks: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            finished: OnceLock::new(),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started
    }

    /// When a role started with these metrics should stop after running for
    /// `duration`. Durations past the clock's range never expire.
    pub fn deadline(&self, duration: Duration) -> Instant {
        self.started
            .checked_add(duration)
            .unwrap_or_else(|| self.started + FAR_FUTURE)
    }

    /// Count `count` records totalling `bytes`; returns the new record total.
    pub fn record_processed(&self, count: u64, bytes: u64) -> u64 {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.processed.fetch_add(count, Ordering::Relaxed) + count
    }

    /// Count one traffic error; returns the new error total.
    pub fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count an asynchronous delivery report for a previously submitted record.
    pub fn record_delivery(&self, acknowledged: bool) {
        if acknowledged {
            self.delivery_acks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn messages_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn delivery_acks(&self) -> u64 {
        self.delivery_acks.load(Ordering::Relaxed)
    }

    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    /// Time since the role started, frozen once [`RunMetrics::finish`] ran.
    pub fn elapsed(&self) -> Duration {
        self.finished
            .get()
            .copied()
            .unwrap_or_else(|| self.started.elapsed())
    }

    /// Freeze the elapsed time. Later calls keep the first value.
    pub fn finish(&self) -> Duration {
        *self.finished.get_or_init(|| self.started.elapsed())
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get().is_some()
    }

    /// Records per second over [`RunMetrics::elapsed`].
    pub fn messages_per_second(&self) -> f64 {
        rate(self.messages_processed() as f64, self.elapsed())
    }

    /// MiB per second over [`RunMetrics::elapsed`].
    pub fn megabytes_per_second(&self) -> f64 {
        rate(self.bytes_processed() as f64 / BYTES_PER_MB, self.elapsed())
    }

    pub fn snapshot(&self) -> RoleSummary {
        RoleSummary {
            role: self.role,
            messages_processed: self.messages_processed(),
            errors: self.errors(),
            bytes_processed: self.bytes_processed(),
            delivery_acks: self.delivery_acks(),
            delivery_failures: self.delivery_failures(),
            elapsed_secs: self.elapsed().as_secs_f64(),
            messages_per_second: self.messages_per_second(),
            megabytes_per_second: self.megabytes_per_second(),
        }
    }
}

fn rate(amount: f64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        amount / elapsed.as_secs_f64()
    } else {
        0.0
    }
}

/// Whether a counter moving from `before` to `after` passed a multiple of `every`.
///
/// Consumers advance by whole batches, so an exact `count % every == 0` check
/// would skip most report points.
pub fn crossed_multiple(before: u64, after: u64, every: u64) -> bool {
    every > 0 && after / every > before / every
}
