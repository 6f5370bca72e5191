//! In-memory store backend.
//!
//! Backs the test suites and paper runs with the same semantics as the
//! Postgres backend: unique keys, full-overwrite score upserts, and the
//! `locked_at IS NULL` lock filter.

use super::{
    MatchResultInput, NewMatchScorer, ParticipantStanding, PredictionBundle, Store,
};
use crate::models::{
    ActiveVariableConfig, CompanyArea, Employee, Match, MatchResult, MatchResultBundle,
    MatchScorer, Prediction, PredictedScorer, PredictionScore, Prode, ProdeParticipant,
    ProdeRankingConfig,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredVariableConfig {
    config: ActiveVariableConfig,
    is_active: bool,
}

#[derive(Default)]
struct Inner {
    matches: FxHashMap<Uuid, Match>,
    results: FxHashMap<Uuid, MatchResult>, // keyed by match_id
    match_scorers: Vec<MatchScorer>,
    predictions: FxHashMap<Uuid, Prediction>,
    predicted_scorers: Vec<PredictedScorer>,
    scores: FxHashMap<Uuid, PredictionScore>, // keyed by prediction_id
    prodes: FxHashMap<Uuid, Prode>,
    ranking_configs: FxHashMap<Uuid, ProdeRankingConfig>,
    participants: FxHashMap<Uuid, ProdeParticipant>,
    employees: FxHashMap<Uuid, Employee>,
    areas: FxHashMap<Uuid, CompanyArea>,
    variable_configs: FxHashMap<Uuid, Vec<StoredVariableConfig>>, // keyed by prode_id
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding helpers
    // ------------------------------------------------------------------

    pub fn insert_match(&self, m: Match) {
        self.inner.write().matches.insert(m.id, m);
    }

    pub fn insert_prode(&self, p: Prode) {
        self.inner.write().prodes.insert(p.id, p);
    }

    pub fn insert_ranking_config(&self, c: ProdeRankingConfig) {
        self.inner.write().ranking_configs.insert(c.prode_id, c);
    }

    pub fn insert_area(&self, a: CompanyArea) {
        self.inner.write().areas.insert(a.id, a);
    }

    pub fn insert_employee(&self, e: Employee) {
        self.inner.write().employees.insert(e.id, e);
    }

    pub fn insert_participant(&self, p: ProdeParticipant) {
        self.inner.write().participants.insert(p.id, p);
    }

    pub fn insert_prediction(&self, p: Prediction) {
        self.inner.write().predictions.insert(p.id, p);
    }

    pub fn insert_predicted_scorer(&self, s: PredictedScorer) {
        self.inner.write().predicted_scorers.push(s);
    }

    pub fn insert_variable_config(&self, prode_id: Uuid, code: &str, points: i64, is_active: bool) {
        self.inner
            .write()
            .variable_configs
            .entry(prode_id)
            .or_default()
            .push(StoredVariableConfig {
                config: ActiveVariableConfig {
                    code: code.to_string(),
                    points,
                },
                is_active,
            });
    }

    // ------------------------------------------------------------------
    // Inspection helpers for tests
    // ------------------------------------------------------------------

    pub fn prediction(&self, prediction_id: Uuid) -> Option<Prediction> {
        self.inner.read().predictions.get(&prediction_id).cloned()
    }

    pub fn prediction_score(&self, prediction_id: Uuid) -> Option<PredictionScore> {
        self.inner.read().scores.get(&prediction_id).cloned()
    }

    fn standing_for(inner: &Inner, participant: &ProdeParticipant) -> Option<ParticipantStanding> {
        let employee = inner.employees.get(&participant.employee_id)?;
        let area = inner.areas.get(&employee.company_area_id)?;

        let mut total_points = 0i64;
        let mut predictions_count = 0i64;
        for prediction in inner
            .predictions
            .values()
            .filter(|p| p.prode_participant_id == participant.id)
        {
            predictions_count += 1;
            if let Some(score) = inner.scores.get(&prediction.id) {
                total_points += score.total_points;
            }
        }

        Some(ParticipantStanding {
            participant_id: participant.id,
            employee_id: employee.id,
            employee_name: employee.full_name(),
            area_id: area.id,
            area_name: area.name.clone(),
            total_points,
            predictions_count,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn match_by_id(&self, match_id: Uuid) -> Result<Option<Match>> {
        Ok(self.inner.read().matches.get(&match_id).cloned())
    }

    async fn match_result(&self, match_id: Uuid) -> Result<Option<MatchResultBundle>> {
        let inner = self.inner.read();
        Ok(inner.results.get(&match_id).map(|result| {
            let scorers = inner
                .match_scorers
                .iter()
                .filter(|s| s.match_result_id == result.id)
                .cloned()
                .collect();
            MatchResultBundle {
                result: result.clone(),
                scorers,
            }
        }))
    }

    async fn submit_match_result(
        &self,
        match_id: Uuid,
        input: &MatchResultInput,
        finalized_at: DateTime<Utc>,
    ) -> Result<MatchResult> {
        let mut inner = self.inner.write();

        let m = inner
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| anyhow!("match {} does not exist", match_id))?;
        m.status = crate::models::MatchStatus::Finished;

        let id = inner
            .results
            .get(&match_id)
            .map(|r| r.id)
            .unwrap_or_else(Uuid::new_v4);
        let result = MatchResult {
            id,
            match_id,
            goals_team_a: input.goals_team_a,
            goals_team_b: input.goals_team_b,
            yellow_cards_team_a: input.yellow_cards_team_a,
            yellow_cards_team_b: input.yellow_cards_team_b,
            red_cards_team_a: input.red_cards_team_a,
            red_cards_team_b: input.red_cards_team_b,
            finalized_at,
        };
        inner.results.insert(match_id, result.clone());
        Ok(result)
    }

    async fn add_match_scorer(
        &self,
        match_result_id: Uuid,
        scorer: &NewMatchScorer,
    ) -> Result<MatchScorer> {
        let row = MatchScorer {
            id: Uuid::new_v4(),
            match_result_id,
            player_full_name: scorer.player_full_name.clone(),
            team_id: scorer.team_id,
            goals_count: scorer.goals_count,
        };
        self.inner.write().match_scorers.push(row.clone());
        Ok(row)
    }

    async fn predictions_for_match(&self, match_id: Uuid) -> Result<Vec<PredictionBundle>> {
        let inner = self.inner.read();
        let mut bundles = Vec::new();

        for prediction in inner
            .predictions
            .values()
            .filter(|p| p.match_id == match_id)
        {
            let participant = inner
                .participants
                .get(&prediction.prode_participant_id)
                .ok_or_else(|| {
                    anyhow!(
                        "participant {} missing for prediction {}",
                        prediction.prode_participant_id,
                        prediction.id
                    )
                })?;

            let active_configs = inner
                .variable_configs
                .get(&participant.prode_id)
                .map(|configs| {
                    configs
                        .iter()
                        .filter(|c| c.is_active)
                        .map(|c| c.config.clone())
                        .collect()
                })
                .unwrap_or_default();

            let predicted_scorers = inner
                .predicted_scorers
                .iter()
                .filter(|s| s.prediction_id == prediction.id)
                .cloned()
                .collect();

            bundles.push(PredictionBundle {
                prediction: prediction.clone(),
                predicted_scorers,
                prode_id: participant.prode_id,
                active_configs,
            });
        }

        // Stable order keeps scoring runs deterministic
        bundles.sort_by_key(|b| b.prediction.id);
        Ok(bundles)
    }

    async fn upsert_prediction_score(&self, score: &PredictionScore) -> Result<()> {
        self.inner
            .write()
            .scores
            .insert(score.prediction_id, score.clone());
        Ok(())
    }

    async fn scheduled_matches_with_kickoff_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>> {
        let inner = self.inner.read();
        let mut matches: Vec<Match> = inner
            .matches
            .values()
            .filter(|m| {
                m.status == crate::models::MatchStatus::Scheduled
                    && m.kickoff >= from
                    && m.kickoff <= to
            })
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.kickoff);
        Ok(matches)
    }

    async fn lock_unlocked_predictions(
        &self,
        match_id: Uuid,
        locked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut inner = self.inner.write();
        let mut locked = 0u64;
        for prediction in inner
            .predictions
            .values_mut()
            .filter(|p| p.match_id == match_id && p.locked_at.is_none())
        {
            prediction.locked_at = Some(locked_at);
            locked += 1;
        }
        Ok(locked)
    }

    async fn prode_by_id(&self, prode_id: Uuid) -> Result<Option<Prode>> {
        Ok(self.inner.read().prodes.get(&prode_id).cloned())
    }

    async fn ranking_config(&self, prode_id: Uuid) -> Result<Option<ProdeRankingConfig>> {
        Ok(self.inner.read().ranking_configs.get(&prode_id).cloned())
    }

    async fn participant_standings(
        &self,
        prode_id: Uuid,
        area_id: Option<Uuid>,
    ) -> Result<Vec<ParticipantStanding>> {
        let inner = self.inner.read();
        let mut standings = Vec::new();

        for participant in inner.participants.values().filter(|p| p.prode_id == prode_id) {
            let standing = Self::standing_for(&inner, participant).ok_or_else(|| {
                anyhow!("employee or area missing for participant {}", participant.id)
            })?;
            if area_id.map_or(true, |id| standing.area_id == id) {
                standings.push(standing);
            }
        }

        standings.sort_by_key(|s| s.participant_id);
        Ok(standings)
    }

    async fn employee_by_id(&self, employee_id: Uuid) -> Result<Option<Employee>> {
        Ok(self.inner.read().employees.get(&employee_id).cloned())
    }

    async fn participant_area_ids(&self, prode_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.inner.read();
        let mut area_ids: Vec<Uuid> = inner
            .participants
            .values()
            .filter(|p| p.prode_id == prode_id)
            .filter_map(|p| inner.employees.get(&p.employee_id))
            .map(|e| e.company_area_id)
            .collect();
        area_ids.sort();
        area_ids.dedup();
        Ok(area_ids)
    }

    async fn prode_ids_for_competition(&self, competition_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.inner.read();
        let mut ids: Vec<Uuid> = inner
            .prodes
            .values()
            .filter(|p| p.competition_id == competition_id)
            .map(|p| p.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}
