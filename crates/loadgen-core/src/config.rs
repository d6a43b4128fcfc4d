//! Run configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default number of records between progress log lines.
pub const DEFAULT_REPORT_EVERY: u64 = 1000;

/// Default number of send errors between error log lines.
pub const DEFAULT_ERROR_REPORT_EVERY: u64 = 100;

/// Which roles a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Producer only.
    Produce,
    /// Consumer only.
    Consume,
    /// Producer first, consumer after the warm-up delay, both concurrently.
    Both,
}

impl RunMode {
    pub fn runs_producer(self) -> bool {
        matches!(self, RunMode::Produce | RunMode::Both)
    }

    pub fn runs_consumer(self) -> bool {
        matches!(self, RunMode::Consume | RunMode::Both)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Produce => write!(f, "produce"),
            RunMode::Consume => write!(f, "consume"),
            RunMode::Both => write!(f, "both"),
        }
    }
}

/// Parameters of a single load generation run.
///
/// Built once at startup and shared read-only by every role.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Bootstrap broker endpoints, in order.
    pub brokers: Vec<String>,
    /// Topic to provision, write to and read from.
    pub topic: String,
    /// Partition count used when creating the topic.
    pub partitions: i32,
    /// Replication factor used when creating the topic.
    pub replication_factor: i32,
    /// Size of every produced payload.
    pub message_size_bytes: usize,
    /// Target producer throughput in MiB per second.
    pub target_throughput_mbps: u64,
    /// Wall-clock length of each role's loop.
    pub duration: Duration,
    /// Consumer group the consumer joins.
    pub consumer_group_id: String,
    pub mode: RunMode,
    /// Wait after provisioning so topic metadata reaches every broker.
    pub propagation_delay: Duration,
    /// Delay between producer start and consumer start in [`RunMode::Both`].
    pub warmup_delay: Duration,
    /// Upper bound of a single consumer poll.
    pub poll_timeout: Duration,
    /// Upper bound on records returned by a single consumer poll.
    pub max_poll_records: usize,
    /// Upper bound on the final producer flush.
    pub flush_timeout: Duration,
    /// Upper bound on the topic creation request.
    pub admin_timeout: Duration,
    /// Records between progress log lines.
    pub report_every: u64,
    /// Send errors between error log lines.
    pub error_report_every: u64,
}

impl LoadConfig {
    /// Create a configuration with the default run parameters.
    pub fn new(brokers: Vec<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers,
            topic: topic.into(),
            partitions: 24,
            replication_factor: 3,
            message_size_bytes: 1024,
            target_throughput_mbps: 100,
            duration: Duration::from_secs(300),
            consumer_group_id: "test-consumer-group".to_string(),
            mode: RunMode::Both,
            propagation_delay: Duration::from_secs(3),
            warmup_delay: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(1),
            max_poll_records: 500,
            flush_timeout: Duration::from_secs(30),
            admin_timeout: Duration::from_secs(10),
            report_every: DEFAULT_REPORT_EVERY,
            error_report_every: DEFAULT_ERROR_REPORT_EVERY,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_topic_layout(mut self, partitions: i32, replication_factor: i32) -> Self {
        self.partitions = partitions;
        self.replication_factor = replication_factor;
        self
    }

    pub fn with_message_size(mut self, bytes: usize) -> Self {
        self.message_size_bytes = bytes;
        self
    }

    pub fn with_target_throughput(mut self, mbps: u64) -> Self {
        self.target_throughput_mbps = mbps;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_consumer_group(mut self, group_id: impl Into<String>) -> Self {
        self.consumer_group_id = group_id.into();
        self
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    pub fn with_warmup_delay(mut self, delay: Duration) -> Self {
        self.warmup_delay = delay;
        self
    }

    pub fn with_poll(mut self, timeout: Duration, max_records: usize) -> Self {
        self.poll_timeout = timeout;
        self.max_poll_records = max_records;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn with_admin_timeout(mut self, timeout: Duration) -> Self {
        self.admin_timeout = timeout;
        self
    }

    pub fn with_report_every(mut self, records: u64) -> Self {
        self.report_every = records;
        self
    }

    /// Brokers joined into a bootstrap list (`host:port,host:port`).
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    /// Check the local invariants of the run.
    ///
    /// The replication factor's upper bound depends on cluster size and is
    /// left to the broker.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(ConfigError::NoBrokers);
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::Empty { field: "topic" });
        }
        if self.mode.runs_consumer() && self.consumer_group_id.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "consumer group id",
            });
        }

        let positive = [
            ("partitions", self.partitions > 0),
            ("replication factor", self.replication_factor > 0),
            ("message size", self.message_size_bytes > 0),
            ("target throughput", self.target_throughput_mbps > 0),
            ("duration", !self.duration.is_zero()),
            ("poll timeout", !self.poll_timeout.is_zero()),
            ("max poll records", self.max_poll_records > 0),
            ("report interval", self.report_every > 0),
            ("error report interval", self.error_report_every > 0),
        ];
        if let Some((field, _)) = positive.into_iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::NotPositive { field });
        }

        if self.mode.runs_producer()
            && crate::limiter::messages_per_second(
                self.target_throughput_mbps,
                self.message_size_bytes,
            ) == 0
        {
            return Err(ConfigError::RateBelowOneMessage {
                message_size_bytes: self.message_size_bytes as u64,
                target_mbps: self.target_throughput_mbps,
            });
        }

        Ok(())
    }
}
