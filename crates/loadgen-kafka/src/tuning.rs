//! librdkafka settings for each client role.

use crate::error::{Error, Result};
use rdkafka::ClientConfig;

/// Parse a raw `KEY=VALUE` client property.
pub fn parse_property(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::InvalidProperty(raw.to_string())),
    }
}

fn apply_overrides(config: &mut ClientConfig, overrides: &[(String, String)]) {
    for (key, value) in overrides {
        config.set(key, value);
    }
}

/// Producer durability, batching and compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerTuning {
    pub acks: String,
    pub batch_size: usize,
    pub linger_ms: u64,
    pub compression: String,
    pub retries: u32,
    /// Raw properties applied last, overriding the fields above.
    pub overrides: Vec<(String, String)>,
}

impl Default for ProducerTuning {
    fn default() -> Self {
        Self {
            acks: "all".to_string(),
            batch_size: 32768,
            linger_ms: 10,
            compression: "lz4".to_string(),
            retries: 10,
            overrides: Vec::new(),
        }
    }
}

impl ProducerTuning {
    pub fn client_config(&self, bootstrap_servers: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", &self.acks)
            .set("batch.size", self.batch_size.to_string())
            .set("linger.ms", self.linger_ms.to_string())
            .set("compression.type", &self.compression)
            .set("retries", self.retries.to_string());
        apply_overrides(&mut config, &self.overrides);
        config
    }
}

/// Consumer fetch sizing and group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerTuning {
    pub fetch_max_bytes: usize,
    pub session_timeout_ms: u64,
    pub overrides: Vec<(String, String)>,
}

impl Default for ConsumerTuning {
    fn default() -> Self {
        Self {
            fetch_max_bytes: 52_428_800,
            session_timeout_ms: 6000,
            overrides: Vec::new(),
        }
    }
}

impl ConsumerTuning {
    /// Auto-committing group member that starts from the earliest offset
    /// when `group_id` has none committed.
    pub fn client_config(&self, bootstrap_servers: &str, group_id: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("fetch.max.bytes", self.fetch_max_bytes.to_string())
            .set("session.timeout.ms", self.session_timeout_ms.to_string());
        apply_overrides(&mut config, &self.overrides);
        config
    }
}
