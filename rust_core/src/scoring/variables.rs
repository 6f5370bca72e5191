//! Pure scoring rules, one function per variable code.
//!
//! Every rule compares one prediction against the final result and returns
//! either 0 or a weight-scaled award. Missing values on either side never
//! award points; they are a normal pipeline state, not an error.

use crate::matching::ScorerMatcher;
use crate::models::{
    MatchResult, MatchScorer, MatchWinner, Prediction, PredictedScorer, VariableCode,
};
use tracing::{debug, warn};

/// Exact score line on both sides.
pub fn exact_result(prediction: &Prediction, result: &MatchResult, weight: i64) -> i64 {
    if prediction.predicted_goals_team_a == Some(result.goals_team_a)
        && prediction.predicted_goals_team_b == Some(result.goals_team_b)
    {
        weight
    } else {
        0
    }
}

/// Winner-or-draw outcome only.
pub fn partial_result(prediction: &Prediction, result: &MatchResult, weight: i64) -> i64 {
    let predicted = MatchWinner::from_goals(
        prediction.predicted_goals_team_a,
        prediction.predicted_goals_team_b,
    );
    let actual = MatchWinner::from_goals(Some(result.goals_team_a), Some(result.goals_team_b));

    if predicted == actual {
        weight
    } else {
        0
    }
}

/// Goal difference, regardless of the exact line.
pub fn goal_difference(prediction: &Prediction, result: &MatchResult, weight: i64) -> i64 {
    let predicted = prediction.predicted_goals_team_a.unwrap_or(0)
        - prediction.predicted_goals_team_b.unwrap_or(0);
    let actual = result.goals_team_a - result.goals_team_b;

    if predicted == actual {
        weight
    } else {
        0
    }
}

/// Exact yellow card counts on both sides. Awards nothing unless all four
/// values are present.
pub fn yellow_cards(prediction: &Prediction, result: &MatchResult, weight: i64) -> i64 {
    match (
        prediction.predicted_yellow_cards_team_a,
        prediction.predicted_yellow_cards_team_b,
        result.yellow_cards_team_a,
        result.yellow_cards_team_b,
    ) {
        (Some(pa), Some(pb), Some(ra), Some(rb)) if pa == ra && pb == rb => weight,
        _ => 0,
    }
}

/// Exact red card counts on both sides.
pub fn red_cards(prediction: &Prediction, result: &MatchResult, weight: i64) -> i64 {
    match (
        prediction.predicted_red_cards_team_a,
        prediction.predicted_red_cards_team_b,
        result.red_cards_team_a,
        result.red_cards_team_b,
    ) {
        (Some(pa), Some(pb), Some(ra), Some(rb)) if pa == ra && pb == rb => weight,
        _ => 0,
    }
}

/// Predicted scorers resolved against actual scorers of the same team.
/// Each matched player awards `min(predicted, actual goals) * weight`;
/// unmatched predictions contribute nothing.
pub fn scorers(
    predicted: &[PredictedScorer],
    actual: &[MatchScorer],
    matcher: &ScorerMatcher,
    weight: i64,
) -> i64 {
    let mut total = 0i64;

    for predicted_scorer in predicted {
        if let Some(found) = matcher.find_match(
            &predicted_scorer.player_full_name,
            actual,
            predicted_scorer.team_id,
        ) {
            let goals_matched = predicted_scorer.predicted_goals.min(found.goals_count).max(0);
            total += goals_matched as i64 * weight;
            debug!(
                "Scorer match: \"{}\" -> \"{}\" (similarity: {:.2}, goals: {})",
                predicted_scorer.player_full_name,
                found.player_full_name,
                found.similarity,
                goals_matched
            );
        }
    }

    total
}

/// Dispatch one configured variable. Unknown codes award nothing.
pub fn score_variable(
    code: &str,
    prediction: &Prediction,
    predicted_scorers: &[PredictedScorer],
    result: &MatchResult,
    actual_scorers: &[MatchScorer],
    matcher: &ScorerMatcher,
    weight: i64,
) -> Option<(VariableCode, i64)> {
    let Some(code) = VariableCode::from_code(code) else {
        warn!("Unknown variable code: {}", code);
        return None;
    };

    let points = match code {
        VariableCode::ExactResult => exact_result(prediction, result, weight),
        VariableCode::PartialResult | VariableCode::WinnerOnly => {
            partial_result(prediction, result, weight)
        }
        VariableCode::GoalDifference => goal_difference(prediction, result, weight),
        VariableCode::YellowCards => yellow_cards(prediction, result, weight),
        VariableCode::RedCards => red_cards(prediction, result, weight),
        VariableCode::Scorers | VariableCode::GoalScorers => {
            scorers(predicted_scorers, actual_scorers, matcher, weight)
        }
    };

    Some((code, points))
}
