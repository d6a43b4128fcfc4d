//! Fire-and-forget producer with delivery accounting.

use crate::error::{client_error, flush_error, send_error};
use crate::tuning::ProducerTuning;
use async_trait::async_trait;
use loadgen_core::broker::RecordSink;
use loadgen_core::{BrokerError, RunMetrics};
use rdkafka::message::DeliveryResult;
use rdkafka::producer::{BaseRecord, Producer, ProducerContext, ThreadedProducer};
use rdkafka::util::Timeout;
use rdkafka::ClientContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Counts delivery reports into the producer's metrics.
///
/// Runs on the producer's polling thread, not on the send loop.
pub struct DeliveryContext {
    metrics: Arc<RunMetrics>,
}

impl DeliveryContext {
    pub fn new(metrics: Arc<RunMetrics>) -> Self {
        Self { metrics }
    }
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        match result {
            Ok(_) => self.metrics.record_delivery(true),
            Err((e, _)) => {
                debug!("[Producer] Delivery failed: {e}");
                self.metrics.record_delivery(false);
            }
        }
    }
}

pub struct KafkaSink {
    producer: Arc<ThreadedProducer<DeliveryContext>>,
}

impl KafkaSink {
    pub fn new(
        bootstrap_servers: &str,
        tuning: &ProducerTuning,
        metrics: Arc<RunMetrics>,
    ) -> Result<Self, BrokerError> {
        let producer: ThreadedProducer<DeliveryContext> = tuning
            .client_config(bootstrap_servers)
            .create_with_context(DeliveryContext::new(metrics))
            .map_err(|e| client_error("failed to create producer", e))?;

        Ok(Self {
            producer: Arc::new(producer),
        })
    }
}

#[async_trait]
impl RecordSink for KafkaSink {
    fn submit(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let record: BaseRecord<'_, (), [u8]> = BaseRecord::to(topic).payload(payload);
        self.producer
            .send(record)
            .map_err(|(e, _record)| send_error(&e))
    }

    async fn flush(&self, timeout: Duration) -> Result<(), BrokerError> {
        let producer = Arc::clone(&self.producer);
        // librdkafka's flush blocks the calling thread.
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BrokerError::Operation(format!("flush task failed: {e}")))?
            .map_err(|e| flush_error(e, timeout))
    }
}
