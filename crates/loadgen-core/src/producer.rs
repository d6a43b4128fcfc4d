//! Paced fixed-size record producer.

use crate::broker::RecordSink;
use crate::config::LoadConfig;
use crate::error::ConfigError;
use crate::limiter::ThroughputLimiter;
use crate::metrics::RunMetrics;
use crate::report::RoleSummary;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Filler byte of every payload. Only the size matters to the broker.
const PAYLOAD_BYTE: u8 = b'x';

/// Sends one reused payload at the configured rate until the run ends.
pub struct LoadProducer<S> {
    sink: S,
    config: Arc<LoadConfig>,
    limiter: ThroughputLimiter,
    payload: Vec<u8>,
}

impl<S: RecordSink> LoadProducer<S> {
    pub fn new(sink: S, config: Arc<LoadConfig>) -> Result<Self, ConfigError> {
        let limiter =
            ThroughputLimiter::new(config.target_throughput_mbps, config.message_size_bytes)
                .ok_or(ConfigError::RateBelowOneMessage {
                    message_size_bytes: config.message_size_bytes as u64,
                    target_mbps: config.target_throughput_mbps,
                })?;
        let payload = vec![PAYLOAD_BYTE; config.message_size_bytes];

        Ok(Self {
            sink,
            config,
            limiter,
            payload,
        })
    }

    pub fn limiter(&self) -> &ThroughputLimiter {
        &self.limiter
    }

    /// Produce until `config.duration` has passed since `metrics` started or
    /// `cancel` fires, then flush and report.
    ///
    /// Rejected submissions are counted as errors and never end the loop.
    pub async fn run(&self, metrics: &RunMetrics, cancel: &CancellationToken) -> RoleSummary {
        let config = &self.config;
        let deadline = metrics.deadline(config.duration);
        let size = self.payload.len() as u64;

        info!(
            "Producing {} msgs/sec ({} MB/s) for {}s...",
            self.limiter.messages_per_second(),
            config.target_throughput_mbps,
            config.duration.as_secs()
        );

        loop {
            let loop_start = Instant::now();
            if loop_start >= deadline {
                break;
            }
            if cancel.is_cancelled() {
                info!("Stopping producer...");
                break;
            }

            match self.sink.submit(&config.topic, &self.payload) {
                Ok(()) => {
                    let sent = metrics.record_processed(1, size);
                    if sent % config.report_every == 0 {
                        info!(
                            "[Producer] Sent {} msgs ({:.1} msg/s, {:.1} MB/s)",
                            sent,
                            metrics.messages_per_second(),
                            metrics.megabytes_per_second()
                        );
                    }
                }
                Err(e) => {
                    let errors = metrics.record_error();
                    debug!("[Producer] Send rejected: {e}");
                    if errors % config.error_report_every == 0 {
                        warn!("[Producer] Errors: {errors} (latest: {e})");
                    }
                }
            }

            if !self.limiter.wait_for_next_slot(loop_start, cancel).await {
                info!("Stopping producer...");
                break;
            }
        }

        if let Err(e) = self.sink.flush(config.flush_timeout).await {
            warn!("[Producer] Flush did not complete: {e}");
        }

        metrics.finish();
        let summary = metrics.snapshot();
        summary.log();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerConnector;
    use crate::metrics::Role;
    use crate::testing::{FakeBroker, FakeCluster, FakeSink};
    use std::time::Duration;

    fn config(mbps: u64, size: usize, duration: Duration) -> Arc<LoadConfig> {
        Arc::new(
            LoadConfig::new(vec!["fake:9092".to_string()], "t")
                .with_target_throughput(mbps)
                .with_message_size(size)
                .with_duration(duration),
        )
    }

    fn producer(
        broker: &FakeBroker,
        config: Arc<LoadConfig>,
        metrics: &Arc<RunMetrics>,
    ) -> LoadProducer<FakeSink> {
        let sink = broker.sink(&config, Arc::clone(metrics)).unwrap();
        LoadProducer::new(sink, config).unwrap()
    }

    #[test]
    fn test_payload_has_configured_size() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let producer = producer(&broker, config(1, 1024, Duration::from_secs(1)), &metrics);
        assert_eq!(producer.payload.len(), 1024);
        assert!(producer.payload.iter().all(|b| *b == PAYLOAD_BYTE));
        assert_eq!(producer.limiter().messages_per_second(), 1024);
    }

    #[test]
    fn test_rejects_rate_below_one_message() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        let config = config(1, 4 * 1024 * 1024, Duration::from_secs(1));
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let sink = broker.sink(&config, metrics).unwrap();
        assert!(LoadProducer::new(sink, config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_for_duration_at_paced_rate() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        // 1 MiB/s of 128 KiB messages: 8 msg/s, one every 125ms.
        let config = config(1, 128 * 1024, Duration::from_secs(5));
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let producer = producer(&broker, config, &metrics);

        let summary = producer.run(&metrics, &CancellationToken::new()).await;

        assert_eq!(summary.messages_processed, 40);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.bytes_processed, 40 * 128 * 1024);
        assert!((summary.elapsed_secs - 5.0).abs() < 0.002);
        assert_eq!(broker.cluster().record_count("t"), 40);
        assert_eq!(broker.cluster().flushes(), 1);
        assert_eq!(metrics.delivery_acks(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_submission_is_counted_once() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        broker.cluster().fail_every_nth_send(3);
        let config = config(1, 128 * 1024, Duration::from_secs(6));
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let producer = producer(&broker, config, &metrics);

        let summary = producer.run(&metrics, &CancellationToken::new()).await;

        let attempts = broker.cluster().submit_attempts();
        assert_eq!(attempts, 48);
        assert_eq!(summary.messages_processed + summary.errors, attempts);
        assert_eq!(summary.errors, 16);
        assert_eq!(
            broker.cluster().record_count("t") as u64,
            summary.messages_processed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_within_one_interval_and_still_flushes() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        // One message per second.
        let config = config(1, 1024 * 1024, Duration::from_secs(300));
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let producer = producer(&broker, config, &metrics);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });

        let summary = producer.run(&metrics, &cancel).await;

        assert_eq!(summary.messages_processed, 3);
        assert!((summary.elapsed_secs - 2.5).abs() < 0.002);
        assert_eq!(broker.cluster().flushes(), 1);
        assert!(metrics.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_duration_runs_until_cancelled() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        let config = config(1, 1024 * 1024, Duration::from_secs(u64::MAX));
        assert!(config.validate().is_ok());
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let producer = producer(&broker, config, &metrics);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let summary = producer.run(&metrics, &cancel).await;

        assert_eq!(summary.messages_processed, 2);
        assert_eq!(broker.cluster().flushes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_sends_nothing() {
        let broker = FakeBroker::new(FakeCluster::with_brokers(1));
        let config = config(1, 1024, Duration::from_secs(10));
        let metrics = Arc::new(RunMetrics::new(Role::Producer));
        let producer = producer(&broker, config, &metrics);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = producer.run(&metrics, &cancel).await;

        assert_eq!(summary.messages_processed, 0);
        assert_eq!(broker.cluster().submit_attempts(), 0);
        assert_eq!(broker.cluster().flushes(), 1);
    }
}
