//! Client-side view of the broker.
//!
//! The harness never speaks the wire protocol itself. Everything it needs
//! from the cluster goes through these traits, and every role gets its own
//! client instance from a [`BrokerConnector`].

use crate::config::LoadConfig;
use crate::error::BrokerError;
use crate::metrics::RunMetrics;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Topic to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
}

impl TopicSpec {
    pub fn from_config(config: &LoadConfig) -> Self {
        Self {
            name: config.topic.clone(),
            partitions: config.partitions,
            replication_factor: config.replication_factor,
        }
    }
}

/// Broker's answer to a create-topic request that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateTopicOutcome {
    Created,
    AlreadyExists,
    /// Any other per-topic error (invalid replication factor, authorization, ...).
    Rejected(String),
}

/// How provisioning ended, as shown in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCreation {
    Created,
    AlreadyExists,
}

/// Administrative interface.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    /// Ask the cluster to create `topic`.
    ///
    /// `Err` means the request itself failed (cluster unreachable, timeout).
    async fn create_topic(
        &self,
        topic: &TopicSpec,
        timeout: Duration,
    ) -> Result<CreateTopicOutcome, BrokerError>;
}

/// Asynchronous record producer.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Enqueue a record for delivery without waiting for the acknowledgement.
    ///
    /// `Err` means the record was not accepted for delivery at all.
    fn submit(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Wait for every accepted record to be acknowledged or failed.
    async fn flush(&self, timeout: Duration) -> Result<(), BrokerError>;
}

/// Metadata of one consumed record. Contents are never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub partition: i32,
    pub offset: i64,
    pub payload_len: usize,
}

/// Consumer group member with automatic offset commit.
#[async_trait]
pub trait RecordSource: Send {
    /// Return up to `max_records` records, waiting at most `timeout`.
    ///
    /// An empty batch is a normal outcome.
    async fn poll_batch(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<ConsumedRecord>, BrokerError>;
}

/// Factory of role-exclusive clients.
pub trait BrokerConnector: Send + Sync + 'static {
    type Admin: TopicAdmin;
    type Sink: RecordSink + 'static;
    type Source: RecordSource + 'static;

    fn admin(&self, config: &LoadConfig) -> Result<Self::Admin, BrokerError>;

    /// Producer client. Delivery reports are counted into `metrics`.
    fn sink(&self, config: &LoadConfig, metrics: Arc<RunMetrics>)
        -> Result<Self::Sink, BrokerError>;

    /// Consumer client, subscribed to the configured topic.
    fn source(&self, config: &LoadConfig) -> Result<Self::Source, BrokerError>;
}
