//! Redis-list transport for the scoring queue.

use super::{Job, JobEnvelope, JobHandler, JobQueue, QueueConfig};
use crate::redis::RedisBus;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{error, info, warn};

pub struct RedisJobQueue {
    bus: RedisBus,
    config: QueueConfig,
}

impl RedisJobQueue {
    pub fn new(bus: RedisBus, config: QueueConfig) -> Self {
        Self { bus, config }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: Job) -> Result<()> {
        let envelope = JobEnvelope::new(job);
        let payload =
            serde_json::to_string(&envelope).context("Failed to serialize job envelope")?;

        timeout(
            self.config.enqueue_timeout,
            self.bus.lpush(&self.config.queue_key, &payload),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "enqueue timed out after {:?} for job {}",
                self.config.enqueue_timeout,
                envelope.id
            )
        })?
    }
}

/// Single-consumer dispatch loop. Runs until the task is aborted.
///
/// Handler failures marked retriable are pushed back with an incremented
/// attempt counter up to `max_attempts`; domain failures and exhausted jobs
/// are logged and dropped.
pub async fn run_consumer(
    bus: RedisBus,
    config: QueueConfig,
    handler: Arc<dyn JobHandler>,
) -> Result<()> {
    let mut conn = bus.get_connection().await?;
    info!("Scoring consumer listening on {}", config.queue_key);

    loop {
        let payload =
            match RedisBus::brpop(&mut conn, &config.queue_key, config.pop_timeout_secs).await {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Queue pop failed: {:#}. Reconnecting", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    conn = bus.get_connection().await?;
                    continue;
                }
            };

        let mut envelope: JobEnvelope = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Dropping malformed job payload: {} ({})", e, payload);
                continue;
            }
        };

        envelope.attempts += 1;
        match handler.handle(&envelope.job).await {
            Ok(()) => {}
            Err(e) if e.is_retriable() && envelope.attempts < config.max_attempts => {
                warn!(
                    "Job {} failed (attempt {}/{}): {}. Re-enqueueing",
                    envelope.id, envelope.attempts, config.max_attempts, e
                );
                let payload = serde_json::to_string(&envelope)
                    .context("Failed to serialize job envelope for redelivery")?;
                if let Err(e) = bus.lpush(&config.queue_key, &payload).await {
                    error!("Failed to re-enqueue job {}: {:#}", envelope.id, e);
                }
            }
            Err(e) => {
                error!(
                    "Job {} ({}) failed permanently after {} attempt(s): {}",
                    envelope.id,
                    envelope.job.job_type(),
                    envelope.attempts,
                    e
                );
            }
        }
    }
}
