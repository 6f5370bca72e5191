// Shared domain models for the prode scoring and ranking services
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Match lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Finished,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(MatchStatus::Scheduled),
            "in_progress" => Some(MatchStatus::InProgress),
            "finished" => Some(MatchStatus::Finished),
            "cancelled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub competition_id: Uuid,
    pub team_a_id: Uuid,
    pub team_b_id: Uuid,
    pub kickoff: DateTime<Utc>,
    pub status: MatchStatus,
    pub stage: String,
    pub location: Option<String>,
}

impl Match {
    /// Status as observed at `now`. Only `scheduled` matches advance by
    /// time; statuses set explicitly (finished, cancelled, in_progress)
    /// are never overridden.
    pub fn effective_status(&self, now: DateTime<Utc>) -> MatchStatus {
        match self.status {
            MatchStatus::Scheduled if self.kickoff <= now => MatchStatus::InProgress,
            other => other,
        }
    }
}

// ============================================================================
// Match results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: Uuid,
    pub match_id: Uuid,
    pub goals_team_a: i32,
    pub goals_team_b: i32,
    pub yellow_cards_team_a: Option<i32>,
    pub yellow_cards_team_b: Option<i32>,
    pub red_cards_team_a: Option<i32>,
    pub red_cards_team_b: Option<i32>,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScorer {
    pub id: Uuid,
    pub match_result_id: Uuid,
    pub player_full_name: String,
    pub team_id: Uuid,
    pub goals_count: i32,
}

/// Match result together with its scorer rows, as the scoring engine
/// consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResultBundle {
    pub result: MatchResult,
    pub scorers: Vec<MatchScorer>,
}

// ============================================================================
// Predictions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub prode_participant_id: Uuid,
    pub match_id: Uuid,
    pub predicted_goals_team_a: Option<i32>,
    pub predicted_goals_team_b: Option<i32>,
    pub predicted_yellow_cards_team_a: Option<i32>,
    pub predicted_yellow_cards_team_b: Option<i32>,
    pub predicted_red_cards_team_a: Option<i32>,
    pub predicted_red_cards_team_b: Option<i32>,
    pub predicted_winner_team_id: Option<Uuid>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl Prediction {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// A prediction may only be edited while unlocked and before kickoff.
    pub fn is_open_for_edit(&self, kickoff: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.locked_at.is_none() && kickoff > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedScorer {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub player_full_name: String,
    pub predicted_goals: i32,
    pub team_id: Uuid,
}

// ============================================================================
// Scoring variables
// ============================================================================

/// Catalog of scoring rule codes. `partial_result`/`winner_only` and
/// `scorers`/`goal_scorers` are distinct catalog entries sharing one rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VariableCode {
    ExactResult,
    PartialResult,
    WinnerOnly,
    GoalDifference,
    YellowCards,
    RedCards,
    Scorers,
    GoalScorers,
}

impl VariableCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableCode::ExactResult => "exact_result",
            VariableCode::PartialResult => "partial_result",
            VariableCode::WinnerOnly => "winner_only",
            VariableCode::GoalDifference => "goal_difference",
            VariableCode::YellowCards => "yellow_cards",
            VariableCode::RedCards => "red_cards",
            VariableCode::Scorers => "scorers",
            VariableCode::GoalScorers => "goal_scorers",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "exact_result" => Some(VariableCode::ExactResult),
            "partial_result" => Some(VariableCode::PartialResult),
            "winner_only" => Some(VariableCode::WinnerOnly),
            "goal_difference" => Some(VariableCode::GoalDifference),
            "yellow_cards" | "yellow_cards_exact" => Some(VariableCode::YellowCards),
            "red_cards" | "red_cards_exact" => Some(VariableCode::RedCards),
            "scorers" => Some(VariableCode::Scorers),
            "goal_scorers" => Some(VariableCode::GoalScorers),
            _ => None,
        }
    }
}

/// An active per-prode rule activation, as loaded for scoring. The raw code
/// string is kept so unknown catalog entries can be reported without
/// aborting the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveVariableConfig {
    pub code: String,
    pub points: i64,
}

/// Per-variable points awarded to one prediction. Keys are restricted to
/// the known catalog, so an unknown code can never be persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointsBreakdown(BTreeMap<VariableCode, i64>);

impl PointsBreakdown {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record points for a rule. Zero awards are not stored.
    pub fn award(&mut self, code: VariableCode, points: i64) {
        if points > 0 {
            *self.0.entry(code).or_insert(0) += points;
        }
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn get(&self, code: VariableCode) -> Option<i64> {
        self.0.get(&code).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VariableCode, &i64)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionScore {
    pub prediction_id: Uuid,
    pub total_points: i64,
    pub details: PointsBreakdown,
    pub calculated_at: DateTime<Utc>,
}

impl PredictionScore {
    /// Total points are always derived from the breakdown, never set
    /// independently.
    pub fn new(prediction_id: Uuid, details: PointsBreakdown, calculated_at: DateTime<Utc>) -> Self {
        let total_points = details.total();
        Self {
            prediction_id,
            total_points,
            details,
            calculated_at,
        }
    }
}

/// Match outcome from either side's goal count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchWinner {
    TeamA,
    TeamB,
    Draw,
}

impl MatchWinner {
    /// Missing goal counts read as a draw, matching how unscored sides
    /// compare in the rule functions.
    pub fn from_goals(goals_a: Option<i32>, goals_b: Option<i32>) -> Self {
        match (goals_a, goals_b) {
            (Some(a), Some(b)) if a > b => MatchWinner::TeamA,
            (Some(a), Some(b)) if b > a => MatchWinner::TeamB,
            _ => MatchWinner::Draw,
        }
    }
}

// ============================================================================
// Pools, participants, areas
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prode {
    pub id: Uuid,
    pub company_id: Uuid,
    pub competition_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaRankingCalculation {
    Sum,
    Average,
}

impl AreaRankingCalculation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaRankingCalculation::Sum => "sum",
            AreaRankingCalculation::Average => "average",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "sum" => Some(AreaRankingCalculation::Sum),
            "average" => Some(AreaRankingCalculation::Average),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProdeRankingConfig {
    pub prode_id: Uuid,
    pub show_individual_general: bool,
    pub show_individual_by_area: bool,
    pub show_area_ranking: bool,
    pub area_ranking_calculation: AreaRankingCalculation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProdeParticipant {
    pub id: Uuid,
    pub prode_id: Uuid,
    pub employee_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub company_area_id: Uuid,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyArea {
    pub id: Uuid,
    pub name: String,
}
