//! Auto-committing group consumer.

use crate::error::client_error;
use crate::tuning::ConsumerTuning;
use async_trait::async_trait;
use loadgen_core::broker::{ConsumedRecord, RecordSource};
use loadgen_core::BrokerError;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::BorrowedMessage;
use rdkafka::Message;
use std::time::Duration;
use tokio::time::Instant;

/// How long to wait for each extra record once a batch has started.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    /// Create a consumer in `group_id` and subscribe it to `topic`.
    pub fn new(
        bootstrap_servers: &str,
        group_id: &str,
        topic: &str,
        tuning: &ConsumerTuning,
    ) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = tuning
            .client_config(bootstrap_servers, group_id)
            .create()
            .map_err(|e| client_error("failed to create consumer", e))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| client_error("failed to subscribe to topic", e))?;

        Ok(Self { consumer })
    }
}

/// How long the next drain `recv` may wait, or `None` once the poll's
/// `timeout` is used up.
fn drain_wait(timeout: Duration, elapsed: Duration) -> Option<Duration> {
    let remaining = timeout.saturating_sub(elapsed);
    (!remaining.is_zero()).then(|| remaining.min(DRAIN_TIMEOUT))
}

fn consumed(msg: &BorrowedMessage<'_>) -> ConsumedRecord {
    ConsumedRecord {
        partition: msg.partition(),
        offset: msg.offset(),
        payload_len: msg.payload_len(),
    }
}

#[async_trait]
impl RecordSource for KafkaSource {
    async fn poll_batch(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<ConsumedRecord>, BrokerError> {
        let mut batch = Vec::new();
        let started = Instant::now();

        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(msg)) => batch.push(consumed(&msg)),
            Ok(Err(e)) => return Err(BrokerError::Operation(format!("receive failed: {e}"))),
            // Nothing arrived within the poll timeout.
            Err(_) => return Ok(batch),
        }

        // Take whatever else is already fetched, up to the batch limit and
        // within the same poll timeout.
        while batch.len() < max_records {
            let Some(wait) = drain_wait(timeout, started.elapsed()) else {
                break;
            };
            match tokio::time::timeout(wait, self.consumer.recv()).await {
                Ok(Ok(msg)) => batch.push(consumed(&msg)),
                _ => break,
            }
        }

        Ok(batch)
    }
}
