//! Idempotent topic provisioning.

use crate::broker::{BrokerConnector, CreateTopicOutcome, TopicAdmin, TopicCreation, TopicSpec};
use crate::config::LoadConfig;
use crate::error::ProvisionError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Create the configured topic if it does not exist yet.
///
/// An existing topic counts as success and is used as-is, even when its
/// partition count or replication factor differ from the configuration.
pub async fn ensure_topic<C: BrokerConnector>(
    connector: &C,
    config: &LoadConfig,
) -> Result<TopicCreation, ProvisionError> {
    let admin = connector.admin(config).map_err(ProvisionError::Client)?;
    let topic = TopicSpec::from_config(config);
    create_topic_if_not_exists(&admin, &topic, config.admin_timeout).await
}

/// Create `topic` through `admin`, treating "already exists" as success.
pub async fn create_topic_if_not_exists<A: TopicAdmin + ?Sized>(
    admin: &A,
    topic: &TopicSpec,
    timeout: Duration,
) -> Result<TopicCreation, ProvisionError> {
    let outcome = admin
        .create_topic(topic, timeout)
        .await
        .map_err(|source| ProvisionError::Request {
            topic: topic.name.clone(),
            source,
        })?;

    match outcome {
        CreateTopicOutcome::Created => {
            info!(
                "Created topic: {} (partitions={}, replication={})",
                topic.name, topic.partitions, topic.replication_factor
            );
            Ok(TopicCreation::Created)
        }
        CreateTopicOutcome::AlreadyExists => {
            info!("Topic {} already exists", topic.name);
            Ok(TopicCreation::AlreadyExists)
        }
        CreateTopicOutcome::Rejected(reason) => Err(ProvisionError::Rejected {
            topic: topic.name.clone(),
            reason,
        }),
    }
}

/// Give topic metadata time to reach every broker.
///
/// The admin call does not signal when propagation is done. Returns `false`
/// if cancelled first.
pub async fn wait_for_propagation(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    info!("Waiting {:?} for topic metadata to propagate", delay);
    tokio::select! {
        _ = cancel.cancelled() => {
            warn!("Cancelled while waiting for topic propagation");
            false
        }
        _ = tokio::time::sleep(delay) => true,
    }
}
