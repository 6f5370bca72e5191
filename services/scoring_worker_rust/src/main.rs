//! Scoring Worker Service
//!
//! Responsibilities:
//! - Consume scoring jobs from the Redis queue and run the scoring engine
//! - Invalidate ranking caches for every prode touched by a scored match
//! - Run the periodic predictions lock sweep ahead of kickoff

mod config;

use crate::config::Config;
use anyhow::{Context, Result};
use chrono::Utc;
use dotenv::dotenv;
use prode_rust_core::cache::RedisRankingCache;
use prode_rust_core::db::{create_pool, DbPoolConfig};
use prode_rust_core::locking::{LockSweep, LockWindow};
use prode_rust_core::matching::{ScorerMatcher, TrigramSimilarity};
use prode_rust_core::queue::{run_consumer, QueueConfig};
use prode_rust_core::ranking::RankingService;
use prode_rust_core::redis::RedisBus;
use prode_rust_core::scoring::{ScoringEngine, ScoringProcessor};
use prode_rust_core::store::{PgStore, Store};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let instance_id = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "scoring-worker-1".to_string());
    info!("Starting Scoring Worker Service ({})...", instance_id);

    // Config
    let config = Config::default();
    let queue_config = QueueConfig::from_env();

    // Database
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool_config = DbPoolConfig::from_env_with_defaults(DbPoolConfig::worker());
    let pool = create_pool(&database_url, &pool_config).await?;
    info!("Connected to database");

    // Redis
    let redis = RedisBus::new().await?;
    info!("Connected to Redis");

    // Core services
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let cache = Arc::new(RedisRankingCache::new(redis.clone()));
    let ranking = Arc::new(RankingService::new(store.clone(), cache));
    let matcher = ScorerMatcher::new(Arc::new(TrigramSimilarity::new()));
    let engine = ScoringEngine::new(store.clone(), matcher);
    let processor = Arc::new(ScoringProcessor::new(engine, ranking));

    // Scoring job consumer
    let consumer_redis = redis.clone();
    let consumer_config = queue_config.clone();
    tokio::spawn(async move {
        if let Err(e) = run_consumer(consumer_redis, consumer_config, processor).await {
            error!("Scoring consumer terminated: {:#}", e);
        }
    });

    // Periodic predictions lock sweep
    let sweep = LockSweep::new(store.clone());
    let sweep_period = Duration::from_secs(config.lock_sweep_interval_secs);
    if !LockWindow::default().covers_period(sweep_period) {
        warn!(
            "Lock window is narrower than the sweep period ({}s); matches may skip the window",
            config.lock_sweep_interval_secs
        );
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_period);
        loop {
            interval.tick().await;
            match sweep.run(Utc::now()).await {
                Ok(report) if report.matches_found > 0 => {
                    info!(
                        "Lock sweep: {} matches, {} predictions locked",
                        report.matches_found, report.predictions_locked
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Lock sweep failed: {:#}", e),
            }
        }
    });

    info!(
        "Scoring worker running (queue: {}, lock sweep every {}s)",
        queue_config.queue_key, config.lock_sweep_interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down scoring worker");
    Ok(())
}
