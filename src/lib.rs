//! Kafka load generator
//!
//! Drives a Kafka cluster with fixed-size records at a target MB/s and/or
//! consumes them back as a consumer group, then reports per-role throughput.
//!
//! # CLI Usage
//!
//! ```bash
//! # Producer and consumer for five minutes at 100 MB/s
//! kafka-loadgen --brokers kafka1:9092,kafka2:9092,kafka3:9092
//!
//! # Producer only, 4 KiB records at 50 MB/s for 10 minutes
//! kafka-loadgen --mode produce --msg-size 4096 --target-mbps 50 --duration 10m
//!
//! # Consumer only, JSON summary
//! kafka-loadgen --mode consume --group-id replay --summary-format json
//!
//! # Raw librdkafka overrides
//! kafka-loadgen --producer-property queue.buffering.max.messages=500000
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use loadgen_core::{LoadConfig, RunMode};
use loadgen_kafka::{parse_property, ConsumerTuning, KafkaConnector, ProducerTuning};

pub mod config;

pub use config::parse_duration;

/// Default brokers of the three-node lab cluster.
pub const DEFAULT_BROKERS: &str = "192.168.56.11:9092,192.168.56.12:9092,192.168.56.13:9092";

#[derive(Parser, Clone, Debug)]
#[command(name = "kafka-loadgen")]
#[command(about = "Rate-controlled Kafka producer/consumer load generator")]
#[command(long_about = None)]
pub struct LoadgenOpts {
    /// Which roles to run
    #[arg(long, value_enum, default_value_t = RunMode::Both, env = "LOADGEN_MODE")]
    pub mode: RunMode,

    /// Kafka brokers (comma-separated host:port list)
    #[arg(
        long,
        value_delimiter = ',',
        default_value = DEFAULT_BROKERS,
        env = "KAFKA_BROKERS"
    )]
    pub brokers: Vec<String>,

    /// Record payload size in bytes
    #[arg(long, default_value = "1024", env = "LOADGEN_MSG_SIZE")]
    pub msg_size: usize,

    /// Target producer throughput in MB/s
    #[arg(long, default_value = "100", env = "LOADGEN_TARGET_MBPS")]
    pub target_mbps: u64,

    /// How long each role runs (e.g. "300", "300s", "5m", "1h")
    #[arg(long, default_value = "300", env = "LOADGEN_DURATION")]
    pub duration: String,

    /// Consumer group id
    #[arg(long, default_value = "test-consumer-group", env = "LOADGEN_GROUP_ID")]
    pub group_id: String,

    /// Delay between starting the producer and the consumer in both mode
    #[arg(long, default_value = "5s")]
    pub warmup: String,

    /// Log progress every N records
    #[arg(long, default_value = "1000")]
    pub report_every: u64,

    /// Format of the final summary printed to stdout
    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    pub summary_format: SummaryFormat,

    #[command(flatten)]
    pub topic: TopicOpts,

    #[command(flatten)]
    pub producer: ProducerTuningOpts,

    #[command(flatten)]
    pub consumer: ConsumerTuningOpts,
}

#[derive(Parser, Clone, Debug)]
pub struct TopicOpts {
    /// Topic to produce to and consume from
    #[arg(long, default_value = "high-throughput", env = "LOADGEN_TOPIC")]
    pub topic: String,

    /// Partition count used when creating the topic
    #[arg(long, default_value = "24")]
    pub partitions: i32,

    /// Replication factor used when creating the topic
    #[arg(long, default_value = "3")]
    pub replication_factor: i32,

    /// Wait after topic creation for metadata to reach all brokers
    #[arg(long, default_value = "3s")]
    pub propagation_delay: String,

    /// Admin request timeout for topic creation
    #[arg(long, default_value = "10s")]
    pub admin_timeout: String,
}

#[derive(Parser, Clone, Debug)]
pub struct ProducerTuningOpts {
    /// Producer acknowledgement level ("all", "1", "0")
    #[arg(long, default_value = "all")]
    pub acks: String,

    /// Producer batch size in bytes
    #[arg(long, default_value = "32768")]
    pub batch_size: usize,

    /// Producer linger time in milliseconds
    #[arg(long, default_value = "10")]
    pub linger_ms: u64,

    /// Producer compression codec
    #[arg(long, default_value = "lz4")]
    pub compression: String,

    /// Producer retry count
    #[arg(long, default_value = "10")]
    pub retries: u32,

    /// Upper bound for flushing in-flight records when the producer stops
    #[arg(long, default_value = "30s")]
    pub flush_timeout: String,

    /// Raw producer property (repeatable)
    #[arg(long = "producer-property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub producer_properties: Vec<(String, String)>,
}

impl ProducerTuningOpts {
    pub fn tuning(&self) -> ProducerTuning {
        ProducerTuning {
            acks: self.acks.clone(),
            batch_size: self.batch_size,
            linger_ms: self.linger_ms,
            compression: self.compression.clone(),
            retries: self.retries,
            overrides: self.producer_properties.clone(),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ConsumerTuningOpts {
    /// Maximum records returned by one poll
    #[arg(long, default_value = "500")]
    pub max_poll_records: usize,

    /// Maximum bytes per fetch request
    #[arg(long, default_value = "52428800")]
    pub fetch_max_bytes: usize,

    /// How long one poll waits for records
    #[arg(long, default_value = "1s")]
    pub poll_timeout: String,

    /// Raw consumer property (repeatable)
    #[arg(long = "consumer-property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub consumer_properties: Vec<(String, String)>,
}

impl ConsumerTuningOpts {
    pub fn tuning(&self) -> ConsumerTuning {
        ConsumerTuning {
            fetch_max_bytes: self.fetch_max_bytes,
            overrides: self.consumer_properties.clone(),
            ..Default::default()
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryFormat {
    Text,
    Json,
}

fn duration_arg(flag: &str, value: &str) -> anyhow::Result<std::time::Duration> {
    parse_duration(value).with_context(|| format!("Invalid --{flag} value '{value}'"))
}

impl LoadgenOpts {
    /// Build the run configuration. Range checks happen when the run starts.
    pub fn load_config(&self) -> anyhow::Result<LoadConfig> {
        let brokers = self
            .brokers
            .iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();

        Ok(LoadConfig::new(brokers, &self.topic.topic)
            .with_mode(self.mode)
            .with_topic_layout(self.topic.partitions, self.topic.replication_factor)
            .with_message_size(self.msg_size)
            .with_target_throughput(self.target_mbps)
            .with_duration(duration_arg("duration", &self.duration)?)
            .with_consumer_group(&self.group_id)
            .with_propagation_delay(duration_arg(
                "propagation-delay",
                &self.topic.propagation_delay,
            )?)
            .with_warmup_delay(duration_arg("warmup", &self.warmup)?)
            .with_poll(
                duration_arg("poll-timeout", &self.consumer.poll_timeout)?,
                self.consumer.max_poll_records,
            )
            .with_flush_timeout(duration_arg("flush-timeout", &self.producer.flush_timeout)?)
            .with_admin_timeout(duration_arg("admin-timeout", &self.topic.admin_timeout)?)
            .with_report_every(self.report_every))
    }

    pub fn connector(&self) -> KafkaConnector {
        KafkaConnector::new(self.producer.tuning(), self.consumer.tuning())
    }
}
