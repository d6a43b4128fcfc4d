//! Fixed-interval send pacing.
//!
//! The limiter converts a byte rate into a per-message interval and sleeps
//! for whatever is left of that interval after each send. It does not carry
//! credit across iterations: a slow send lowers the achieved rate and is not
//! made up for later.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Below this remaining wait the tokio timer would round up to a full tick,
/// so the limiter yields to the scheduler until the slot opens instead.
const TIMER_RESOLUTION: Duration = Duration::from_millis(1);

/// Whole messages per second that fit in `target_mbps` MiB/s.
///
/// Integer division: a message larger than the per-second budget yields 0.
pub fn messages_per_second(target_mbps: u64, message_size_bytes: usize) -> u64 {
    if message_size_bytes == 0 {
        return 0;
    }
    target_mbps.saturating_mul(BYTES_PER_MB) / message_size_bytes as u64
}

/// Pacer for one producer loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputLimiter {
    messages_per_second: u64,
    interval: Duration,
}

impl ThroughputLimiter {
    /// Returns `None` when the target rate rounds down to zero messages per second.
    pub fn new(target_mbps: u64, message_size_bytes: usize) -> Option<Self> {
        let messages_per_second = messages_per_second(target_mbps, message_size_bytes);
        if messages_per_second == 0 {
            return None;
        }
        Some(Self {
            messages_per_second,
            interval: Duration::from_secs_f64(1.0 / messages_per_second as f64),
        })
    }

    pub fn messages_per_second(&self) -> u64 {
        self.messages_per_second
    }

    /// Target time between two sends.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `max(0, interval - (now - loop_start))`.
    pub fn remaining(&self, loop_start: Instant, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(loop_start))
    }

    /// Wait until one interval has passed since `loop_start`.
    ///
    /// Returns `false` if `cancel` fired before the slot opened.
    pub async fn wait_for_next_slot(
        &self,
        loop_start: Instant,
        cancel: &CancellationToken,
    ) -> bool {
        let deadline = loop_start + self.interval;

        let remaining = self.remaining(loop_start, Instant::now());
        if remaining >= TIMER_RESOLUTION {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep_until(deadline) => return true,
            }
        }

        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return false;
            }
            tokio::task::yield_now().await;
        }
        !cancel.is_cancelled()
    }
}
