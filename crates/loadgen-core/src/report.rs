//! Final run summaries.

use crate::broker::TopicCreation;
use crate::config::RunMode;
use crate::metrics::Role;
use serde::Serialize;
use tracing::info;

/// Snapshot of one role's counters at the end of its run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSummary {
    pub role: Role,
    pub messages_processed: u64,
    pub errors: u64,
    pub bytes_processed: u64,
    /// Producer only: records acknowledged by the cluster.
    pub delivery_acks: u64,
    /// Producer only: records the client gave up on after submission.
    pub delivery_failures: u64,
    pub elapsed_secs: f64,
    pub messages_per_second: f64,
    pub megabytes_per_second: f64,
}

impl RoleSummary {
    /// Log the role's final summary lines.
    pub fn log(&self) {
        match self.role {
            Role::Producer => {
                info!(
                    "[Producer] Sent {} messages in {:.1}s ({:.1} msg/s, {:.1} MB/s)",
                    self.messages_processed,
                    self.elapsed_secs,
                    self.messages_per_second,
                    self.megabytes_per_second
                );
                info!("[Producer] Errors: {}", self.errors);
                info!(
                    "[Producer] Delivery: {} acknowledged, {} failed",
                    self.delivery_acks, self.delivery_failures
                );
            }
            Role::Consumer => {
                info!(
                    "[Consumer] Consumed {} messages in {:.1}s ({:.1} msg/s)",
                    self.messages_processed, self.elapsed_secs, self.messages_per_second
                );
                if self.errors > 0 {
                    info!("[Consumer] Errors: {}", self.errors);
                }
            }
        }
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!(
            "{}:\n\
             - Messages: {}\n\
             - Errors: {}\n\
             - Bytes: {}\n\
             - Elapsed: {:.1}s\n\
             - Rate: {:.1} msg/s ({:.1} MB/s)\n",
            self.role,
            self.messages_processed,
            self.errors,
            self.bytes_processed,
            self.elapsed_secs,
            self.messages_per_second,
            self.megabytes_per_second
        ));
        if self.role == Role::Producer {
            out.push_str(&format!(
                "- Delivery: {} acknowledged, {} failed\n",
                self.delivery_acks, self.delivery_failures
            ));
        }
    }
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub topic: String,
    pub topic_creation: TopicCreation,
    /// `None` when the mode does not produce.
    pub producer: Option<RoleSummary>,
    /// `None` when the mode does not consume, or the run was cancelled
    /// before the consumer started.
    pub consumer: Option<RoleSummary>,
    pub cancelled: bool,
}

impl RunReport {
    /// Human-readable summary printed at the end of a run.
    pub fn render_text(&self) -> String {
        let topic_state = match self.topic_creation {
            TopicCreation::Created => "created",
            TopicCreation::AlreadyExists => "already existed",
        };
        let mut out = format!(
            "Load Generator Report\n\
             =====================\n\
             Mode: {}\n\
             Topic: {} ({})\n\
             Cancelled: {}\n\n",
            self.mode,
            self.topic,
            topic_state,
            if self.cancelled { "yes" } else { "no" }
        );

        for summary in [&self.producer, &self.consumer].into_iter().flatten() {
            summary.render_into(&mut out);
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
