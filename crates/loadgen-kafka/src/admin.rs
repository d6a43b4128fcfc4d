//! Topic creation through the Kafka admin API.

use crate::error::client_error;
use async_trait::async_trait;
use loadgen_core::broker::{CreateTopicOutcome, TopicAdmin, TopicSpec};
use loadgen_core::BrokerError;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication, TopicResult};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;

pub struct KafkaAdmin {
    client: AdminClient<DefaultClientContext>,
}

impl KafkaAdmin {
    pub fn new(bootstrap_servers: &str) -> Result<Self, BrokerError> {
        let client = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .create()
            .map_err(|e| client_error("failed to create admin client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TopicAdmin for KafkaAdmin {
    async fn create_topic(
        &self,
        topic: &TopicSpec,
        timeout: Duration,
    ) -> Result<CreateTopicOutcome, BrokerError> {
        let new_topic = NewTopic::new(
            &topic.name,
            topic.partitions,
            TopicReplication::Fixed(topic.replication_factor),
        );
        let opts = AdminOptions::new()
            .operation_timeout(Some(timeout))
            .request_timeout(Some(timeout));

        let results = self
            .client
            .create_topics(&[new_topic], &opts)
            .await
            .map_err(|e| BrokerError::Operation(format!("failed to create topics: {e}")))?;

        // One topic per request, so one result.
        results
            .into_iter()
            .next()
            .map(topic_outcome)
            .ok_or_else(|| {
                BrokerError::Operation(format!("no result returned for topic '{}'", topic.name))
            })
    }
}

fn topic_outcome(result: TopicResult) -> CreateTopicOutcome {
    match result {
        Ok(_) => CreateTopicOutcome::Created,
        Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => CreateTopicOutcome::AlreadyExists,
        Err((_, code)) => CreateTopicOutcome::Rejected(code.to_string()),
    }
}
