//! In-memory broker used by the unit tests.

use crate::broker::{
    BrokerConnector, ConsumedRecord, CreateTopicOutcome, RecordSink, RecordSource, TopicAdmin,
    TopicSpec,
};
use crate::config::LoadConfig;
use crate::error::BrokerError;
use crate::metrics::RunMetrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct ClusterState {
    brokers: i32,
    reachable: bool,
    /// topic -> per-partition payload sizes
    topics: HashMap<String, Vec<Vec<usize>>>,
    /// (group, topic) -> per-partition next offset
    committed: HashMap<(String, String), Vec<usize>>,
    submit_attempts: u64,
    fail_every_nth_send: Option<u64>,
    failing_polls: u64,
    polls: u64,
    poll_sizes: Vec<usize>,
    flushes: u64,
    next_partition: usize,
}

/// Shared state of a fake cluster. Clones observe the same topics.
#[derive(Clone)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn with_brokers(brokers: i32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                brokers,
                reachable: true,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap()
    }

    pub fn admin(&self) -> FakeAdmin {
        FakeAdmin {
            cluster: self.clone(),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Reject every `n`th submitted record at enqueue time.
    pub fn fail_every_nth_send(&self, n: u64) {
        self.lock().fail_every_nth_send = Some(n);
    }

    /// Make the next `n` polls fail.
    pub fn fail_next_polls(&self, n: u64) {
        self.lock().failing_polls = n;
    }

    /// Append `count` records of `size` bytes, spread over the topic's partitions.
    pub fn preload(&self, topic: &str, count: usize, size: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            append(&mut state, topic, size);
        }
    }

    pub fn partitions(&self, topic: &str) -> Option<usize> {
        self.lock().topics.get(topic).map(Vec::len)
    }

    pub fn record_count(&self, topic: &str) -> usize {
        self.lock()
            .topics
            .get(topic)
            .map(|parts| parts.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn submit_attempts(&self) -> u64 {
        self.lock().submit_attempts
    }

    pub fn polls(&self) -> u64 {
        self.lock().polls
    }

    /// Batch size of every successful poll, in order.
    pub fn poll_sizes(&self) -> Vec<usize> {
        self.lock().poll_sizes.clone()
    }

    pub fn flushes(&self) -> u64 {
        self.lock().flushes
    }
}

fn append(state: &mut ClusterState, topic: &str, size: usize) {
    let slot = state.next_partition;
    state.next_partition += 1;
    let parts = state
        .topics
        .entry(topic.to_string())
        .or_insert_with(|| vec![Vec::new()]);
    let index = slot % parts.len();
    parts[index].push(size);
}

pub struct FakeAdmin {
    cluster: FakeCluster,
}

#[async_trait]
impl TopicAdmin for FakeAdmin {
    async fn create_topic(
        &self,
        topic: &TopicSpec,
        _timeout: Duration,
    ) -> Result<CreateTopicOutcome, BrokerError> {
        let mut state = self.cluster.lock();
        if !state.reachable {
            return Err(BrokerError::Operation("all brokers down".to_string()));
        }
        if state.topics.contains_key(&topic.name) {
            return Ok(CreateTopicOutcome::AlreadyExists);
        }
        if topic.replication_factor > state.brokers {
            return Ok(CreateTopicOutcome::Rejected(format!(
                "replication factor {} larger than {} available brokers",
                topic.replication_factor, state.brokers
            )));
        }
        state.topics.insert(
            topic.name.clone(),
            vec![Vec::new(); topic.partitions as usize],
        );
        Ok(CreateTopicOutcome::Created)
    }
}

pub struct FakeSink {
    cluster: FakeCluster,
    metrics: Arc<RunMetrics>,
}

#[async_trait]
impl RecordSink for FakeSink {
    fn submit(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut state = self.cluster.lock();
        state.submit_attempts += 1;
        if let Some(n) = state.fail_every_nth_send {
            if state.submit_attempts % n == 0 {
                return Err(BrokerError::QueueFull);
            }
        }
        append(&mut state, topic, payload.len());
        drop(state);
        self.metrics.record_delivery(true);
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), BrokerError> {
        self.cluster.lock().flushes += 1;
        Ok(())
    }
}

pub struct FakeSource {
    cluster: FakeCluster,
    group: String,
    topic: String,
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn poll_batch(
        &mut self,
        timeout: Duration,
        max_records: usize,
    ) -> Result<Vec<ConsumedRecord>, BrokerError> {
        let batch = {
            let mut state = self.cluster.lock();
            state.polls += 1;
            if state.failing_polls > 0 {
                state.failing_polls -= 1;
                return Err(BrokerError::Operation("fetch failed".to_string()));
            }

            let parts = state.topics.get(&self.topic).cloned().unwrap_or_default();
            let key = (self.group.clone(), self.topic.clone());
            let offsets = state
                .committed
                .entry(key)
                .or_default();
            if offsets.len() < parts.len() {
                offsets.resize(parts.len(), 0);
            }

            let mut batch = Vec::new();
            'outer: for (partition, records) in parts.iter().enumerate() {
                while offsets[partition] < records.len() {
                    if batch.len() == max_records {
                        break 'outer;
                    }
                    let offset = offsets[partition];
                    batch.push(ConsumedRecord {
                        partition: partition as i32,
                        offset: offset as i64,
                        payload_len: records[offset],
                    });
                    offsets[partition] += 1;
                }
            }
            state.poll_sizes.push(batch.len());
            batch
        };

        if batch.is_empty() {
            tokio::time::sleep(timeout).await;
        }
        Ok(batch)
    }
}

/// Connector handing out fake clients bound to one cluster.
#[derive(Clone)]
pub struct FakeBroker {
    cluster: FakeCluster,
    fail_admin: bool,
    fail_sink: bool,
    fail_source: bool,
    sinks_created: Arc<AtomicUsize>,
    sources_created: Arc<AtomicUsize>,
}

impl FakeBroker {
    pub fn new(cluster: FakeCluster) -> Self {
        Self {
            cluster,
            fail_admin: false,
            fail_sink: false,
            fail_source: false,
            sinks_created: Arc::new(AtomicUsize::new(0)),
            sources_created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_admin(mut self) -> Self {
        self.fail_admin = true;
        self
    }

    pub fn failing_sink(mut self) -> Self {
        self.fail_sink = true;
        self
    }

    pub fn failing_source(mut self) -> Self {
        self.fail_source = true;
        self
    }

    pub fn cluster(&self) -> &FakeCluster {
        &self.cluster
    }

    pub fn sinks_created(&self) -> usize {
        self.sinks_created.load(Ordering::SeqCst)
    }

    pub fn sources_created(&self) -> usize {
        self.sources_created.load(Ordering::SeqCst)
    }
}

impl BrokerConnector for FakeBroker {
    type Admin = FakeAdmin;
    type Sink = FakeSink;
    type Source = FakeSource;

    fn admin(&self, _config: &LoadConfig) -> Result<FakeAdmin, BrokerError> {
        if self.fail_admin {
            return Err(BrokerError::Client("no admin".to_string()));
        }
        Ok(self.cluster.admin())
    }

    fn sink(
        &self,
        _config: &LoadConfig,
        metrics: Arc<RunMetrics>,
    ) -> Result<FakeSink, BrokerError> {
        if self.fail_sink {
            return Err(BrokerError::Client("no producer".to_string()));
        }
        self.sinks_created.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSink {
            cluster: self.cluster.clone(),
            metrics,
        })
    }

    fn source(&self, config: &LoadConfig) -> Result<FakeSource, BrokerError> {
        if self.fail_source {
            return Err(BrokerError::Client("no consumer".to_string()));
        }
        self.sources_created.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSource {
            cluster: self.cluster.clone(),
            group: config.consumer_group_id.clone(),
            topic: config.topic.clone(),
        })
    }
}
