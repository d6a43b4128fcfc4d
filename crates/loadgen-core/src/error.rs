//! Error types for the load generator.
//!
//! Only setup failures surface as errors. Traffic failures (a rejected send,
//! a failed poll) are absorbed into [`crate::metrics::RunMetrics`] and never
//! reach these types from inside a role loop.

use thiserror::Error;

/// A run parameter that cannot produce a meaningful run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one broker endpoint is required")]
    NoBrokers,

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error(
        "message size {message_size_bytes} bytes exceeds the per-second budget of \
         {target_mbps} MB/s; the target rate would be zero messages per second"
    )]
    RateBelowOneMessage {
        message_size_bytes: u64,
        target_mbps: u64,
    },
}

/// Errors reported by a broker client implementation.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    /// The client could not be constructed (bad config, unresolvable brokers).
    #[error("client creation failed: {0}")]
    Client(String),

    /// The broker rejected or failed an operation.
    #[error("broker operation failed: {0}")]
    Operation(String),

    /// The client-side queue is full; the record was not enqueued.
    #[error("local queue full")]
    QueueFull,

    /// Flushing outstanding records did not complete in time.
    #[error("flush did not complete within {0:?}")]
    FlushTimeout(std::time::Duration),
}

/// Fatal failure while provisioning the topic.
#[derive(Error, Debug, Clone)]
pub enum ProvisionError {
    #[error("failed to create admin client: {0}")]
    Client(#[source] BrokerError),

    #[error("failed to create topic '{topic}': {reason}")]
    Rejected { topic: String, reason: String },

    #[error("admin request for topic '{topic}' failed: {source}")]
    Request {
        topic: String,
        #[source]
        source: BrokerError,
    },
}

/// Top-level error of a load generation run.
#[derive(Error, Debug)]
pub enum LoadgenError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("topic provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("{role} setup failed: {source}")]
    RoleSetup {
        role: crate::metrics::Role,
        #[source]
        source: BrokerError,
    },

    #[error("{role} task failed: {reason}")]
    Task {
        role: crate::metrics::Role,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, LoadgenError>;
