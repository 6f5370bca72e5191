//! Match scoring engine.
//!
//! Turns a finalized match result into one PredictionScore row per
//! prediction. Every run fully overwrites the scores it touches, so
//! re-delivery of the same job is harmless by construction.

use super::variables::score_variable;
use crate::db::retry::is_retriable_error;
use crate::error::{ProdeError, Result};
use crate::matching::ScorerMatcher;
use crate::models::{MatchResultBundle, PointsBreakdown, PredictionScore};
use crate::store::{PredictionBundle, Store};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringSummary {
    pub match_id: Uuid,
    pub predictions_scored: usize,
    pub predictions_failed: usize,
}

pub struct ScoringEngine {
    store: Arc<dyn Store>,
    matcher: ScorerMatcher,
}

impl ScoringEngine {
    pub fn new(store: Arc<dyn Store>, matcher: ScorerMatcher) -> Self {
        Self { store, matcher }
    }

    /// Compute and persist scores for every prediction of the match.
    ///
    /// Returns `None` when the match has no result yet: scoring before a
    /// result exists is a normal pipeline state, not an error. A missing
    /// match is surfaced as not-found. Failures isolated to a single
    /// prediction are logged and skipped; a systemic store failure aborts
    /// the run so the queue can redeliver it.
    pub async fn calculate_points_for_match(
        &self,
        match_id: Uuid,
    ) -> Result<Option<ScoringSummary>> {
        info!("Calculating points for match {}", match_id);

        self.store
            .match_by_id(match_id)
            .await?
            .ok_or_else(|| ProdeError::not_found("match"))?;

        let Some(result_bundle) = self.store.match_result(match_id).await? else {
            debug!("Match {} has no result yet", match_id);
            return Ok(None);
        };

        let predictions = self.store.predictions_for_match(match_id).await?;
        info!("Found {} predictions to score", predictions.len());

        let mut summary = ScoringSummary {
            match_id,
            predictions_scored: 0,
            predictions_failed: 0,
        };

        for bundle in &predictions {
            match self.score_prediction(bundle, &result_bundle).await {
                Ok(()) => summary.predictions_scored += 1,
                // Systemic failure (store unreachable): abort the run so
                // the queue redelivers it
                Err(ProdeError::Infrastructure(e)) if is_retriable_error(&e) => {
                    return Err(ProdeError::Infrastructure(e));
                }
                // Row-level failure: isolated to this prediction
                Err(e) => {
                    warn!("Skipping prediction {}: {}", bundle.prediction.id, e);
                    summary.predictions_failed += 1;
                }
            }
        }

        info!(
            "Finished calculating points for match {}: {} scored, {} failed",
            match_id, summary.predictions_scored, summary.predictions_failed
        );
        Ok(Some(summary))
    }

    async fn score_prediction(
        &self,
        bundle: &PredictionBundle,
        result_bundle: &MatchResultBundle,
    ) -> Result<()> {
        let mut breakdown = PointsBreakdown::new();

        for config in &bundle.active_configs {
            if let Some((code, points)) = score_variable(
                &config.code,
                &bundle.prediction,
                &bundle.predicted_scorers,
                &result_bundle.result,
                &result_bundle.scorers,
                &self.matcher,
                config.points,
            ) {
                breakdown.award(code, points);
            }
        }

        let score = PredictionScore::new(bundle.prediction.id, breakdown, Utc::now());
        debug!(
            "Prediction {}: total points = {}",
            bundle.prediction.id, score.total_points
        );

        self.store.upsert_prediction_score(&score).await?;
        Ok(())
    }
}
