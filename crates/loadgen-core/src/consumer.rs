//! Batch consumer that counts what it reads.
//!
//! Despite the name, no lag against the producer's high watermark is
//! computed; only the consumed count and its rate are reported.

use crate::broker::RecordSource;
use crate::config::LoadConfig;
use crate::metrics::{crossed_multiple, RunMetrics};
use crate::report::RoleSummary;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polls the configured topic until the run ends.
pub struct LagTrackingConsumer<S> {
    source: S,
    config: Arc<LoadConfig>,
}

impl<S: RecordSource> LagTrackingConsumer<S> {
    pub fn new(source: S, config: Arc<LoadConfig>) -> Self {
        Self { source, config }
    }

    /// Consume until `config.duration` has passed since `metrics` started or
    /// `cancel` fires, then close the client and report.
    ///
    /// A poll in flight is abandoned as soon as `cancel` fires. Otherwise it
    /// runs to its timeout, so the loop may overrun the deadline by one poll.
    pub async fn run(mut self, metrics: &RunMetrics, cancel: &CancellationToken) -> RoleSummary {
        let config = Arc::clone(&self.config);
        let deadline = metrics.deadline(config.duration);

        info!(
            "Consuming from {} (group: {}) for {}s...",
            config.topic,
            config.consumer_group_id,
            config.duration.as_secs()
        );

        loop {
            if Instant::now() >= deadline {
                break;
            }
            if cancel.is_cancelled() {
                info!("Stopping consumer...");
                break;
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stopping consumer...");
                    break;
                }
                polled = self.source.poll_batch(config.poll_timeout, config.max_poll_records) => {
                    polled
                }
            };

            match polled {
                Ok(batch) if batch.is_empty() => {
                    debug!("[Consumer] Empty poll");
                }
                Ok(batch) => {
                    let bytes: u64 = batch.iter().map(|r| r.payload_len as u64).sum();
                    let before = metrics.messages_processed();
                    let consumed = metrics.record_processed(batch.len() as u64, bytes);
                    if let Some(last) = batch.last() {
                        debug!(
                            "[Consumer] Polled {} records (up to partition {} offset {})",
                            batch.len(),
                            last.partition,
                            last.offset
                        );
                    }
                    if crossed_multiple(before, consumed, config.report_every) {
                        info!(
                            "[Consumer] Consumed {} msgs ({:.1} msg/s)",
                            consumed,
                            metrics.messages_per_second()
                        );
                    }
                }
                Err(e) => {
                    let errors = metrics.record_error();
                    warn!("[Consumer] Poll failed ({errors} errors so far): {e}");
                    // Back off for one poll interval so a failing fetch does not spin.
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(config.poll_timeout) => {}
                    }
                }
            }
        }

        metrics.finish();
        let summary = metrics.snapshot();
        summary.log();

        drop(self.source);
        debug!("[Consumer] Closed");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConnector;
    use crate::metrics::Role;
    use crate::testing::{FakeBroker, FakeCluster, FakeSource};
    use std::time::Duration;

    fn config(duration: Duration) -> Arc<LoadConfig> {
        Arc::new(
            LoadConfig::new(vec!["fake:9092".to_string()], "t")
                .with_consumer_group("g")
                .with_duration(duration)
                .with_poll(Duration::from_secs(1), 500),
        )
    }

    fn consumer(broker: &FakeBroker, config: Arc<LoadConfig>) -> LagTrackingConsumer<FakeSource> {
        let source = broker.source(&config).unwrap();
        LagTrackingConsumer::new(source, config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumes_backlog_in_bounded_batches() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        broker.cluster().preload("t", 1200, 100);
        let metrics = RunMetrics::new(Role::Consumer);

        let summary = consumer(&broker, config(Duration::from_secs(3)))
            .run(&metrics, &CancellationToken::new())
            .await;

        assert_eq!(summary.messages_processed, 1200);
        assert_eq!(summary.bytes_processed, 1200 * 100);
        assert_eq!(summary.errors, 0);
        // Three full-or-partial batches, then empty polls until the deadline.
        assert!(broker.cluster().polls() >= 4);
        let elapsed = Duration::from_secs_f64(summary.elapsed_secs);
        assert!(elapsed >= Duration::from_secs(3) && elapsed <= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumed_count_never_decreases() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        broker.cluster().preload("t", 2000, 10);
        broker.cluster().fail_next_polls(2);
        let metrics = Arc::new(RunMetrics::new(Role::Consumer));
        let consumer = consumer(&broker, config(Duration::from_secs(10)));

        let observer = {
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while !metrics.is_finished() {
                    seen.push(metrics.messages_processed());
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                seen
            })
        };

        let summary = consumer.run(&metrics, &CancellationToken::new()).await;
        let seen = observer.await.unwrap();

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(summary.messages_processed, 2000);
        assert_eq!(summary.errors, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_from_earliest_for_new_group() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        broker.cluster().preload("t", 50, 1);

        let first = consumer(&broker, config(Duration::from_secs(2)))
            .run(&RunMetrics::new(Role::Consumer), &CancellationToken::new())
            .await;
        assert_eq!(first.messages_processed, 50);

        // Same group resumes from its committed offsets.
        let second = consumer(&broker, config(Duration::from_secs(2)))
            .run(&RunMetrics::new(Role::Consumer), &CancellationToken::new())
            .await;
        assert_eq!(second.messages_processed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_a_pending_poll() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        let metrics = RunMetrics::new(Role::Consumer);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let config = Arc::new(
            LoadConfig::new(vec!["fake:9092".to_string()], "t")
                .with_consumer_group("g")
                .with_duration(Duration::from_secs(300))
                .with_poll(Duration::from_secs(30), 500),
        );
        let summary = consumer(&broker, config).run(&metrics, &cancel).await;

        assert!(metrics.is_finished());
        assert_eq!(summary.messages_processed, 0);
        assert!((summary.elapsed_secs - 0.1).abs() < 0.002);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_duration_runs_until_cancelled() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        broker.cluster().preload("t", 10, 1);
        let metrics = RunMetrics::new(Role::Consumer);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let summary = consumer(&broker, config(Duration::from_secs(u64::MAX)))
            .run(&metrics, &cancel)
            .await;

        assert_eq!(summary.messages_processed, 10);
        assert!((summary.elapsed_secs - 5.0).abs() < 0.002);
    }
}
