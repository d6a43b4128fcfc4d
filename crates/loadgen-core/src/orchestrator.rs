//! Drives a complete run: provisioning, then one or both traffic roles.

use crate::broker::BrokerConnector;
use crate::config::{LoadConfig, RunMode};
use crate::consumer::LagTrackingConsumer;
use crate::error::{LoadgenError, Result};
use crate::metrics::{Role, RunMetrics};
use crate::producer::LoadProducer;
use crate::provision::{ensure_topic, wait_for_propagation};
use crate::report::{RoleSummary, RunReport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the roles selected by [`LoadConfig::mode`] against one cluster.
pub struct RunOrchestrator<C> {
    connector: Arc<C>,
    config: Arc<LoadConfig>,
}

impl<C: BrokerConnector> RunOrchestrator<C> {
    pub fn new(connector: Arc<C>, config: LoadConfig) -> Self {
        Self {
            connector,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Validate, provision the topic and run the selected roles to completion.
    ///
    /// `cancel` is the operator's interrupt. Running roles stop at their next
    /// suspension point and still report, so a cancelled run is `Ok`.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport> {
        let config = &self.config;
        config.validate()?;

        info!(
            "Starting {} run against {} (topic: {})",
            config.mode,
            config.bootstrap_servers(),
            config.topic
        );

        let topic_creation = ensure_topic(self.connector.as_ref(), config).await?;
        let mut report = RunReport {
            mode: config.mode,
            topic: config.topic.clone(),
            topic_creation,
            producer: None,
            consumer: None,
            cancelled: false,
        };

        if !wait_for_propagation(config.propagation_delay, cancel).await {
            report.cancelled = true;
            return Ok(report);
        }

        match config.mode {
            RunMode::Produce => {
                report.producer = Some(produce(self.connector.as_ref(), config, cancel).await?);
            }
            RunMode::Consume => {
                report.consumer = Some(consume(self.connector.as_ref(), config, cancel).await?);
            }
            RunMode::Both => {
                let (producer, consumer) = self.run_both(cancel).await?;
                report.producer = Some(producer);
                report.consumer = consumer;
            }
        }

        report.cancelled = cancel.is_cancelled();
        info!("Run finished");
        Ok(report)
    }

    /// Producer first, consumer after the warm-up delay, then wait for both.
    ///
    /// A setup failure of either role stops the other one; the failure is
    /// returned once both tasks have ended.
    async fn run_both(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(RoleSummary, Option<RoleSummary>)> {
        let config = &self.config;
        let roles = cancel.child_token();

        let producer = spawn_role(Role::Producer, &roles, {
            let connector = Arc::clone(&self.connector);
            let config = Arc::clone(config);
            let roles = roles.clone();
            async move { produce(connector.as_ref(), &config, &roles).await }
        });

        info!("Waiting {:?} before starting the consumer", config.warmup_delay);
        let warmed_up = tokio::select! {
            _ = roles.cancelled() => false,
            _ = tokio::time::sleep(config.warmup_delay) => true,
        };

        let consumer = if warmed_up {
            Some(spawn_role(Role::Consumer, &roles, {
                let connector = Arc::clone(&self.connector);
                let config = Arc::clone(config);
                let roles = roles.clone();
                async move { consume(connector.as_ref(), &config, &roles).await }
            }))
        } else {
            warn!("Cancelled during warm-up; consumer not started");
            None
        };

        let (producer, consumer) = tokio::join!(
            join_role(Role::Producer, producer, &roles),
            join_optional_role(Role::Consumer, consumer, &roles),
        );

        let producer = producer?;
        let consumer = consumer.transpose()?;
        Ok((producer, consumer))
    }
}

async fn produce<C: BrokerConnector>(
    connector: &C,
    config: &Arc<LoadConfig>,
    cancel: &CancellationToken,
) -> Result<RoleSummary> {
    let metrics = Arc::new(RunMetrics::new(Role::Producer));
    let sink = connector
        .sink(config, Arc::clone(&metrics))
        .map_err(|source| LoadgenError::RoleSetup {
            role: Role::Producer,
            source,
        })?;
    let producer = LoadProducer::new(sink, Arc::clone(config))?;
    Ok(producer.run(&metrics, cancel).await)
}

async fn consume<C: BrokerConnector>(
    connector: &C,
    config: &Arc<LoadConfig>,
    cancel: &CancellationToken,
) -> Result<RoleSummary> {
    let metrics = RunMetrics::new(Role::Consumer);
    let source = connector
        .source(config)
        .map_err(|source| LoadgenError::RoleSetup {
            role: Role::Consumer,
            source,
        })?;
    let consumer = LagTrackingConsumer::new(source, Arc::clone(config));
    Ok(consumer.run(&metrics, cancel).await)
}

/// Spawn a role task that cancels its sibling if it fails.
fn spawn_role<F>(
    role: Role,
    roles: &CancellationToken,
    task: F,
) -> JoinHandle<Result<RoleSummary>>
where
    F: std::future::Future<Output = Result<RoleSummary>> + Send + 'static,
{
    let roles = roles.clone();
    tokio::spawn(async move {
        let result = task.await;
        if let Err(e) = &result {
            error!("[{role}] {e}");
            roles.cancel();
        }
        result
    })
}

/// Wait for a role task. A task that panicked also cancels its sibling.
async fn join_role(
    role: Role,
    handle: JoinHandle<Result<RoleSummary>>,
    roles: &CancellationToken,
) -> Result<RoleSummary> {
    handle.await.map_err(|e| {
        error!("[{role}] task failed: {e}");
        roles.cancel();
        LoadgenError::Task {
            role,
            reason: e.to_string(),
        }
    })?
}

async fn join_optional_role(
    role: Role,
    handle: Option<JoinHandle<Result<RoleSummary>>>,
    roles: &CancellationToken,
) -> Option<Result<RoleSummary>> {
    match handle {
        Some(handle) => Some(join_role(role, handle, roles).await),
        None => None,
    }
}
