//! Postgres store backend.
//!
//! Manual row mapping over `sqlx::query`, transactional result submission,
//! and ON CONFLICT upserts keyed by the unique prediction id. Score upserts
//! go through the transient-failure retry helper since they run in bulk
//! inside scoring jobs.

use super::{
    MatchResultInput, NewMatchScorer, ParticipantStanding, PredictionBundle, Store,
};
use crate::db::retry::execute_with_retry;
use crate::models::{
    ActiveVariableConfig, AreaRankingCalculation, Employee, Match, MatchResult,
    MatchResultBundle, MatchScorer, MatchStatus, Prediction, PredictedScorer, PredictionScore,
    Prode, ProdeRankingConfig,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ----------------------------------------------------------------------
// Row mapping
// ----------------------------------------------------------------------

fn map_match(row: &PgRow) -> Result<Match> {
    let status: String = row.try_get("status")?;
    Ok(Match {
        id: row.try_get("id")?,
        competition_id: row.try_get("competition_id")?,
        team_a_id: row.try_get("team_a_id")?,
        team_b_id: row.try_get("team_b_id")?,
        kickoff: row.try_get("kickoff")?,
        status: MatchStatus::from_str_opt(&status)
            .ok_or_else(|| anyhow!("unknown match status: {}", status))?,
        stage: row.try_get("stage")?,
        location: row.try_get("location")?,
    })
}

fn map_result(row: &PgRow) -> Result<MatchResult> {
    Ok(MatchResult {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        goals_team_a: row.try_get("goals_team_a")?,
        goals_team_b: row.try_get("goals_team_b")?,
        yellow_cards_team_a: row.try_get("yellow_cards_team_a")?,
        yellow_cards_team_b: row.try_get("yellow_cards_team_b")?,
        red_cards_team_a: row.try_get("red_cards_team_a")?,
        red_cards_team_b: row.try_get("red_cards_team_b")?,
        finalized_at: row.try_get("finalized_at")?,
    })
}

fn map_scorer(row: &PgRow) -> Result<MatchScorer> {
    Ok(MatchScorer {
        id: row.try_get("id")?,
        match_result_id: row.try_get("match_result_id")?,
        player_full_name: row.try_get("player_full_name")?,
        team_id: row.try_get("team_id")?,
        goals_count: row.try_get("goals_count")?,
    })
}

fn map_prediction(row: &PgRow) -> Result<Prediction> {
    Ok(Prediction {
        id: row.try_get("id")?,
        prode_participant_id: row.try_get("prode_participant_id")?,
        match_id: row.try_get("match_id")?,
        predicted_goals_team_a: row.try_get("predicted_goals_team_a")?,
        predicted_goals_team_b: row.try_get("predicted_goals_team_b")?,
        predicted_yellow_cards_team_a: row.try_get("predicted_yellow_cards_team_a")?,
        predicted_yellow_cards_team_b: row.try_get("predicted_yellow_cards_team_b")?,
        predicted_red_cards_team_a: row.try_get("predicted_red_cards_team_a")?,
        predicted_red_cards_team_b: row.try_get("predicted_red_cards_team_b")?,
        predicted_winner_team_id: row.try_get("predicted_winner_team_id")?,
        locked_at: row.try_get("locked_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn match_by_id(&self, match_id: Uuid) -> Result<Option<Match>> {
        let row = sqlx::query(
            r#"
            SELECT id, competition_id, team_a_id, team_b_id, kickoff, status, stage, location
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load match")?;

        row.as_ref().map(map_match).transpose()
    }

    async fn match_result(&self, match_id: Uuid) -> Result<Option<MatchResultBundle>> {
        let row = sqlx::query(
            r#"
            SELECT id, match_id, goals_team_a, goals_team_b,
                   yellow_cards_team_a, yellow_cards_team_b,
                   red_cards_team_a, red_cards_team_b, finalized_at
            FROM match_results
            WHERE match_id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load match result")?;

        let result = match row.as_ref().map(map_result).transpose()? {
            Some(r) => r,
            None => return Ok(None),
        };

        let scorer_rows = sqlx::query(
            r#"
            SELECT id, match_result_id, player_full_name, team_id, goals_count
            FROM match_scorers
            WHERE match_result_id = $1
            ORDER BY id
            "#,
        )
        .bind(result.id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load match scorers")?;

        let scorers = scorer_rows
            .iter()
            .map(map_scorer)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(MatchResultBundle { result, scorers }))
    }

    async fn submit_match_result(
        &self,
        match_id: Uuid,
        input: &MatchResultInput,
        finalized_at: DateTime<Utc>,
    ) -> Result<MatchResult> {
        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;

        let row = sqlx::query(
            r#"
            INSERT INTO match_results (
                id, match_id, goals_team_a, goals_team_b,
                yellow_cards_team_a, yellow_cards_team_b,
                red_cards_team_a, red_cards_team_b, finalized_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (match_id) DO UPDATE SET
                goals_team_a = EXCLUDED.goals_team_a,
                goals_team_b = EXCLUDED.goals_team_b,
                yellow_cards_team_a = EXCLUDED.yellow_cards_team_a,
                yellow_cards_team_b = EXCLUDED.yellow_cards_team_b,
                red_cards_team_a = EXCLUDED.red_cards_team_a,
                red_cards_team_b = EXCLUDED.red_cards_team_b,
                finalized_at = EXCLUDED.finalized_at
            RETURNING id, match_id, goals_team_a, goals_team_b,
                      yellow_cards_team_a, yellow_cards_team_b,
                      red_cards_team_a, red_cards_team_b, finalized_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(match_id)
        .bind(input.goals_team_a)
        .bind(input.goals_team_b)
        .bind(input.yellow_cards_team_a)
        .bind(input.yellow_cards_team_b)
        .bind(input.red_cards_team_a)
        .bind(input.red_cards_team_b)
        .bind(finalized_at)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to upsert match result")?;

        sqlx::query("UPDATE matches SET status = 'finished' WHERE id = $1")
            .bind(match_id)
            .execute(&mut *tx)
            .await
            .context("Failed to advance match status")?;

        tx.commit().await.context("Failed to commit result submission")?;
        map_result(&row)
    }

    async fn add_match_scorer(
        &self,
        match_result_id: Uuid,
        scorer: &NewMatchScorer,
    ) -> Result<MatchScorer> {
        let row = sqlx::query(
            r#"
            INSERT INTO match_scorers (id, match_result_id, player_full_name, team_id, goals_count)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, match_result_id, player_full_name, team_id, goals_count
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(match_result_id)
        .bind(&scorer.player_full_name)
        .bind(scorer.team_id)
        .bind(scorer.goals_count)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert match scorer")?;

        map_scorer(&row)
    }

    async fn predictions_for_match(&self, match_id: Uuid) -> Result<Vec<PredictionBundle>> {
        let prediction_rows = sqlx::query(
            r#"
            SELECT p.id, p.prode_participant_id, p.match_id,
                   p.predicted_goals_team_a, p.predicted_goals_team_b,
                   p.predicted_yellow_cards_team_a, p.predicted_yellow_cards_team_b,
                   p.predicted_red_cards_team_a, p.predicted_red_cards_team_b,
                   p.predicted_winner_team_id, p.locked_at,
                   pp.prode_id
            FROM predictions p
            JOIN prode_participants pp ON pp.id = p.prode_participant_id
            WHERE p.match_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load predictions for match")?;

        if prediction_rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut predictions = Vec::with_capacity(prediction_rows.len());
        let mut prediction_ids = Vec::with_capacity(prediction_rows.len());
        let mut prode_ids: Vec<Uuid> = Vec::new();
        for row in &prediction_rows {
            let prediction = map_prediction(row)?;
            let prode_id: Uuid = row.try_get("prode_id")?;
            prediction_ids.push(prediction.id);
            if !prode_ids.contains(&prode_id) {
                prode_ids.push(prode_id);
            }
            predictions.push((prediction, prode_id));
        }

        let scorer_rows = sqlx::query(
            r#"
            SELECT id, prediction_id, player_full_name, predicted_goals, team_id
            FROM predicted_scorers
            WHERE prediction_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&prediction_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load predicted scorers")?;

        let mut scorers_by_prediction: FxHashMap<Uuid, Vec<PredictedScorer>> =
            FxHashMap::default();
        for row in &scorer_rows {
            let scorer = PredictedScorer {
                id: row.try_get("id")?,
                prediction_id: row.try_get("prediction_id")?,
                player_full_name: row.try_get("player_full_name")?,
                predicted_goals: row.try_get("predicted_goals")?,
                team_id: row.try_get("team_id")?,
            };
            scorers_by_prediction
                .entry(scorer.prediction_id)
                .or_default()
                .push(scorer);
        }

        let config_rows = sqlx::query(
            r#"
            SELECT pvc.prode_id, pv.code, pvc.points
            FROM prode_variable_configs pvc
            JOIN prediction_variables pv ON pv.id = pvc.prediction_variable_id
            WHERE pvc.is_active AND pvc.prode_id = ANY($1)
            ORDER BY pv.code
            "#,
        )
        .bind(&prode_ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load prode variable configs")?;

        let mut configs_by_prode: FxHashMap<Uuid, Vec<ActiveVariableConfig>> =
            FxHashMap::default();
        for row in &config_rows {
            let prode_id: Uuid = row.try_get("prode_id")?;
            configs_by_prode
                .entry(prode_id)
                .or_default()
                .push(ActiveVariableConfig {
                    code: row.try_get("code")?,
                    points: row.try_get::<i32, _>("points")? as i64,
                });
        }

        Ok(predictions
            .into_iter()
            .map(|(prediction, prode_id)| PredictionBundle {
                predicted_scorers: scorers_by_prediction
                    .remove(&prediction.id)
                    .unwrap_or_default(),
                active_configs: configs_by_prode.get(&prode_id).cloned().unwrap_or_default(),
                prode_id,
                prediction,
            })
            .collect())
    }

    async fn upsert_prediction_score(&self, score: &PredictionScore) -> Result<()> {
        let details = serde_json::to_value(&score.details)
            .context("Failed to serialize points breakdown")?;

        execute_with_retry(
            || async {
                sqlx::query(
                    r#"
                    INSERT INTO prediction_scores (prediction_id, total_points, details, calculated_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (prediction_id) DO UPDATE SET
                        total_points = EXCLUDED.total_points,
                        details = EXCLUDED.details,
                        calculated_at = EXCLUDED.calculated_at
                    "#,
                )
                .bind(score.prediction_id)
                .bind(score.total_points)
                .bind(&details)
                .bind(score.calculated_at)
                .execute(&self.pool)
                .await
                .context("Failed to upsert prediction score")?;
                Ok(())
            },
            3,
        )
        .await
    }

    async fn scheduled_matches_with_kickoff_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Match>> {
        let rows = sqlx::query(
            r#"
            SELECT id, competition_id, team_a_id, team_b_id, kickoff, status, stage, location
            FROM matches
            WHERE status = 'scheduled' AND kickoff >= $1 AND kickoff <= $2
            ORDER BY kickoff
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load matches in lock window")?;

        rows.iter().map(map_match).collect()
    }

    async fn lock_unlocked_predictions(
        &self,
        match_id: Uuid,
        locked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE predictions SET locked_at = $2 WHERE match_id = $1 AND locked_at IS NULL",
        )
        .bind(match_id)
        .bind(locked_at)
        .execute(&self.pool)
        .await
        .context("Failed to lock predictions")?;

        Ok(result.rows_affected())
    }

    async fn prode_by_id(&self, prode_id: Uuid) -> Result<Option<Prode>> {
        let row = sqlx::query(
            "SELECT id, company_id, competition_id, name, is_active FROM prodes WHERE id = $1",
        )
        .bind(prode_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load prode")?;

        row.map(|row| {
            Ok(Prode {
                id: row.try_get("id")?,
                company_id: row.try_get("company_id")?,
                competition_id: row.try_get("competition_id")?,
                name: row.try_get("name")?,
                is_active: row.try_get("is_active")?,
            })
        })
        .transpose()
    }

    async fn ranking_config(&self, prode_id: Uuid) -> Result<Option<ProdeRankingConfig>> {
        let row = sqlx::query(
            r#"
            SELECT prode_id, show_individual_general, show_individual_by_area,
                   show_area_ranking, area_ranking_calculation
            FROM prode_ranking_configs
            WHERE prode_id = $1
            "#,
        )
        .bind(prode_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load ranking config")?;

        row.map(|row| {
            let calculation: String = row.try_get("area_ranking_calculation")?;
            Ok(ProdeRankingConfig {
                prode_id: row.try_get("prode_id")?,
                show_individual_general: row.try_get("show_individual_general")?,
                show_individual_by_area: row.try_get("show_individual_by_area")?,
                show_area_ranking: row.try_get("show_area_ranking")?,
                area_ranking_calculation: AreaRankingCalculation::from_str_opt(&calculation)
                    .ok_or_else(|| anyhow!("unknown area ranking calculation: {}", calculation))?,
            })
        })
        .transpose()
    }

    async fn participant_standings(
        &self,
        prode_id: Uuid,
        area_id: Option<Uuid>,
    ) -> Result<Vec<ParticipantStanding>> {
        let rows = sqlx::query(
            r#"
            SELECT pp.id AS participant_id,
                   e.id AS employee_id,
                   e.first_name || ' ' || e.last_name AS employee_name,
                   ca.id AS area_id,
                   ca.name AS area_name,
                   COALESCE(SUM(ps.total_points), 0)::BIGINT AS total_points,
                   COUNT(p.id) AS predictions_count
            FROM prode_participants pp
            JOIN employees e ON e.id = pp.employee_id
            JOIN company_areas ca ON ca.id = e.company_area_id
            LEFT JOIN predictions p ON p.prode_participant_id = pp.id
            LEFT JOIN prediction_scores ps ON ps.prediction_id = p.id
            WHERE pp.prode_id = $1 AND ($2::uuid IS NULL OR ca.id = $2)
            GROUP BY pp.id, e.id, ca.id
            ORDER BY pp.id
            "#,
        )
        .bind(prode_id)
        .bind(area_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load participant standings")?;

        rows.iter()
            .map(|row| {
                Ok(ParticipantStanding {
                    participant_id: row.try_get("participant_id")?,
                    employee_id: row.try_get("employee_id")?,
                    employee_name: row.try_get("employee_name")?,
                    area_id: row.try_get("area_id")?,
                    area_name: row.try_get("area_name")?,
                    total_points: row.try_get("total_points")?,
                    predictions_count: row.try_get("predictions_count")?,
                })
            })
            .collect()
    }

    async fn employee_by_id(&self, employee_id: Uuid) -> Result<Option<Employee>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, company_area_id FROM employees WHERE id = $1",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load employee")?;

        row.map(|row| {
            Ok(Employee {
                id: row.try_get("id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                company_area_id: row.try_get("company_area_id")?,
            })
        })
        .transpose()
    }

    async fn participant_area_ids(&self, prode_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT e.company_area_id
            FROM prode_participants pp
            JOIN employees e ON e.id = pp.employee_id
            WHERE pp.prode_id = $1
            ORDER BY e.company_area_id
            "#,
        )
        .bind(prode_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load participant areas")?;

        rows.iter()
            .map(|row| Ok(row.try_get("company_area_id")?))
            .collect()
    }

    async fn prode_ids_for_competition(&self, competition_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM prodes WHERE competition_id = $1 ORDER BY id")
            .bind(competition_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load prodes for competition")?;

        rows.iter().map(|row| Ok(row.try_get("id")?)).collect()
    }
}
