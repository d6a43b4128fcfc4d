use crate::admin::KafkaAdmin;
use crate::consumer::KafkaSource;
use crate::producer::KafkaSink;
use crate::tuning::{ConsumerTuning, ProducerTuning};
use loadgen_core::{BrokerConnector, BrokerError, LoadConfig, RunMetrics};
use std::sync::Arc;

/// Creates a fresh rdkafka client for every role that asks for one.
#[derive(Debug, Clone, Default)]
pub struct KafkaConnector {
    producer: ProducerTuning,
    consumer: ConsumerTuning,
}

impl KafkaConnector {
    pub fn new(producer: ProducerTuning, consumer: ConsumerTuning) -> Self {
        Self { producer, consumer }
    }

    pub fn producer_tuning(&self) -> &ProducerTuning {
        &self.producer
    }

    pub fn consumer_tuning(&self) -> &ConsumerTuning {
        &self.consumer
    }
}

impl BrokerConnector for KafkaConnector {
    type Admin = KafkaAdmin;
    type Sink = KafkaSink;
    type Source = KafkaSource;

    fn admin(&self, config: &LoadConfig) -> Result<KafkaAdmin, BrokerError> {
        KafkaAdmin::new(&config.bootstrap_servers())
    }

    fn sink(
        &self,
        config: &LoadConfig,
        metrics: Arc<RunMetrics>,
    ) -> Result<KafkaSink, BrokerError> {
        KafkaSink::new(&config.bootstrap_servers(), &self.producer, metrics)
    }

    fn source(&self, config: &LoadConfig) -> Result<KafkaSource, BrokerError> {
        KafkaSource::new(
            &config.bootstrap_servers(),
            &config.consumer_group_id,
            &config.topic,
            &self.consumer,
        )
    }
}
