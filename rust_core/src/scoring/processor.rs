//! Queue-side scoring processor.
//!
//! Handles `calculate_scores` jobs: run the engine for the match, then
//! invalidate the ranking caches of every prode in the match's competition
//! so the next read reflects the fresh scores.

use super::ScoringEngine;
use crate::error::Result;
use crate::queue::{Job, JobHandler};
use crate::ranking::RankingService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct ScoringProcessor {
    engine: ScoringEngine,
    ranking: Arc<RankingService>,
}

impl ScoringProcessor {
    pub fn new(engine: ScoringEngine, ranking: Arc<RankingService>) -> Self {
        Self { engine, ranking }
    }
}

#[async_trait]
impl JobHandler for ScoringProcessor {
    async fn handle(&self, job: &Job) -> Result<()> {
        match job {
            Job::CalculateScores { match_id } => {
                info!("Processing score calculation for match {}", match_id);

                self.engine.calculate_points_for_match(*match_id).await?;
                self.ranking.invalidate_caches_for_match(*match_id).await?;

                info!("Successfully calculated scores for match {}", match_id);
                Ok(())
            }
        }
    }
}
