//! Persistence seam for the scoring and ranking core.
//!
//! The engine, lock sweep, and ranking service consume the relational store
//! exclusively through the `Store` trait, injected at construction. `PgStore`
//! is the Postgres backend; `MemoryStore` backs tests and paper runs.

use crate::models::{
    ActiveVariableConfig, Employee, Match, MatchResult, MatchResultBundle, MatchScorer,
    Prediction, PredictedScorer, PredictionScore, Prode, ProdeRankingConfig,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// A prediction with everything scoring needs: its predicted scorers and
/// the active variable configuration of the owning prode.
#[derive(Debug, Clone)]
pub struct PredictionBundle {
    pub prediction: Prediction,
    pub predicted_scorers: Vec<PredictedScorer>,
    pub prode_id: Uuid,
    pub active_configs: Vec<ActiveVariableConfig>,
}

/// One participant row as ranking aggregation consumes it: identity, the
/// employee's area as of now, and totals derived from PredictionScore rows.
#[derive(Debug, Clone)]
pub struct ParticipantStanding {
    pub participant_id: Uuid,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub area_id: Uuid,
    pub area_name: String,
    pub total_points: i64,
    pub predictions_count: i64,
}

/// Payload of a result submission.
#[derive(Debug, Clone)]
pub struct MatchResultInput {
    pub goals_team_a: i32,
    pub goals_team_b: i32,
    pub yellow_cards_team_a: Option<i32>,
    pub yellow_cards_team_b: Option<i32>,
    pub red_cards_team_a: Option<i32>,
    pub red_cards_team_b: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewMatchScorer {
    pub player_full_name: String,
    pub team_id: Uuid,
    pub goals_count: i32,
}

/// Transactional persistence interface. Errors are infrastructure-level;
/// absence is modeled with `Option`, never with an error.
#[async_trait]
pub trait Store: Send + Sync {
    async fn match_by_id(&self, match_id: Uuid) -> Result<Option<Match>>;

    async fn match_result(&self, match_id: Uuid) -> Result<Option<MatchResultBundle>>;

    /// Upsert the result and advance the match to `finished` in one
    /// transaction. Existing scorer rows survive a result overwrite.
    async fn submit_match_result(
        &self,
        match_id: Uuid,
        input: &MatchResultInput,
        finalized_at: DateTime<Utc>,
    ) -> Result<MatchResult>;

    async fn add_match_scorer(
        &self,
        match_result_id: Uuid,
        scorer: &NewMatchScorer,
    ) -> Result<MatchScorer>;

    async fn predictions_for_match(&self, match_id: Uuid) -> Result<Vec<PredictionBundle>>;

    /// Full overwrite keyed by prediction id.
    async fn upsert_prediction_score(&self, score: &PredictionScore) -> Result<()>;

    async fn scheduled_matches_with_kickoff_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>>;

    /// Set `locked_at` on every still-unlocked prediction of the match.
    /// Returns the number of rows locked.
    async fn lock_unlocked_predictions(
        &self,
        match_id: Uuid,
        locked_at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn prode_by_id(&self, prode_id: Uuid) -> Result<Option<Prode>>;

    async fn ranking_config(&self, prode_id: Uuid) -> Result<Option<ProdeRankingConfig>>;

    /// Standings for every participant of the prode, optionally scoped to
    /// one company area. Totals come from PredictionScore rows only.
    async fn participant_standings(
        &self,
        prode_id: Uuid,
        area_id: Option<Uuid>,
    ) -> Result<Vec<ParticipantStanding>>;

    async fn employee_by_id(&self, employee_id: Uuid) -> Result<Option<Employee>>;

    /// Distinct area ids with at least one participant in the prode.
    async fn participant_area_ids(&self, prode_id: Uuid) -> Result<Vec<Uuid>>;

    async fn prode_ids_for_competition(&self, competition_id: Uuid) -> Result<Vec<Uuid>>;
}
