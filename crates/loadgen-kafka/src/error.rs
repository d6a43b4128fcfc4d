//! Error types and rdkafka error mapping.

use loadgen_core::BrokerError;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while assembling client settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid client property '{0}': expected KEY=VALUE")]
    InvalidProperty(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn client_error(context: &str, e: KafkaError) -> BrokerError {
    BrokerError::Client(format!("{context}: {e}"))
}

/// A record the producer refused to enqueue.
pub(crate) fn send_error(e: &KafkaError) -> BrokerError {
    match e.rdkafka_error_code() {
        Some(RDKafkaErrorCode::QueueFull) => BrokerError::QueueFull,
        _ => BrokerError::Operation(format!("failed to enqueue record: {e}")),
    }
}

pub(crate) fn flush_error(e: KafkaError, timeout: Duration) -> BrokerError {
    match e.rdkafka_error_code() {
        Some(RDKafkaErrorCode::OperationTimedOut) => BrokerError::FlushTimeout(timeout),
        _ => BrokerError::Operation(format!("flush failed: {e}")),
    }
}
