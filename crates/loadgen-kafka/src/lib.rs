//! Kafka clients for the load generator, built on rdkafka.
//!
//! [`KafkaConnector`] implements [`loadgen_core::BrokerConnector`]:
//! - admin: topic creation with a fixed replication factor
//! - producer: `ThreadedProducer` whose delivery reports feed the run metrics
//! - consumer: auto-committing `StreamConsumer` polled in bounded batches

pub mod admin;
pub mod connector;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod tuning;

pub use connector::KafkaConnector;
pub use error::{Error, Result};
pub use tuning::{parse_property, ConsumerTuning, ProducerTuning};
