//! Core of the Kafka load generator.
//!
//! A run provisions one topic, then drives a rate-limited producer, a
//! batch consumer, or both at once, and reports throughput per role:
//! 1. [`provision::ensure_topic`] creates the topic (existing is fine)
//! 2. [`producer::LoadProducer`] sends fixed-size records at a target MB/s
//! 3. [`consumer::LagTrackingConsumer`] reads them back in bounded batches
//!
//! Nothing here talks to a broker directly. Clients come from a
//! [`broker::BrokerConnector`]; the Kafka one lives in `loadgen-kafka`.
//!
//! # Example
//!
//! ```ignore
//! use loadgen_core::{LoadConfig, RunMode, RunOrchestrator};
//!
//! let config = LoadConfig::new(vec!["localhost:9092".into()], "high-throughput")
//!     .with_mode(RunMode::Both)
//!     .with_target_throughput(100);
//!
//! let report = RunOrchestrator::new(connector, config).run(&cancel).await?;
//! println!("{}", report.render_text());
//! ```

pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod orchestrator;
pub mod producer;
pub mod provision;
pub mod report;

#[cfg(test)]
mod testing;

pub use broker::{BrokerConnector, TopicCreation};
pub use config::{LoadConfig, RunMode};
pub use error::{BrokerError, ConfigError, LoadgenError, ProvisionError};
pub use metrics::{Role, RunMetrics};
pub use orchestrator::RunOrchestrator;
pub use report::{RoleSummary, RunReport};
