//! Durable scoring-job queue.
//!
//! At-least-once delivery over a Redis list: producers LPUSH a JSON
//! envelope, a single consumer per job type BRPOPs and dispatches to the
//! registered handler. Enqueue is wrapped in a bounded timeout so a queue
//! outage degrades the submission request instead of hanging it; the
//! scoring engine's full-overwrite writes make redelivery safe without a
//! distributed lock.

use crate::error::ProdeError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use uuid::Uuid;

pub mod memory;
pub mod redis;

pub use memory::MemoryJobQueue;
pub use redis::{run_consumer, RedisJobQueue};

/// Default bound on how long an enqueue may block the caller.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    CalculateScores { match_id: Uuid },
}

impl Job {
    pub fn job_type(&self) -> &'static str {
        match self {
            Job::CalculateScores { .. } => "calculate_scores",
        }
    }
}

/// Wire format pushed onto the queue. `attempts` counts deliveries so a
/// poison job cannot circulate forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub attempts: u32,
    #[serde(flatten)]
    pub job: Job,
}

impl JobEnvelope {
    pub fn new(job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempts: 0,
            job,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub queue_key: String,
    pub enqueue_timeout: Duration,
    /// BRPOP timeout; bounds how long the consumer sleeps between polls.
    pub pop_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_key: "jobs:scoring".to_string(),
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            pop_timeout_secs: 5,
            max_attempts: 3,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_key: env::var("SCORING_QUEUE_KEY").unwrap_or(defaults.queue_key),
            enqueue_timeout: env::var("QUEUE_ENQUEUE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.enqueue_timeout),
            pop_timeout_secs: env::var("QUEUE_POP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pop_timeout_secs),
            max_attempts: env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
        }
    }
}

/// Producer side of the queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue with a bounded wait. An error here means the job was not
    /// durably queued; callers report it and move on.
    async fn enqueue(&self, job: Job) -> Result<()>;
}

/// Consumer-side job handler.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> std::result::Result<(), ProdeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_format() {
        let match_id = Uuid::new_v4();
        let envelope = JobEnvelope::new(Job::CalculateScores { match_id });

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"calculate_scores\""));
        assert!(json.contains(&match_id.to_string()));

        let parsed: JobEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.job, Job::CalculateScores { match_id });
        assert_eq!(parsed.attempts, 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.queue_key, "jobs:scoring");
        assert_eq!(config.enqueue_timeout, Duration::from_secs(3));
        assert_eq!(config.max_attempts, 3);
    }
}
