//! Scorer Matcher
//!
//! Resolves a predicted scorer name against the actual scorers of a match:
//! candidates are filtered to the predicted team, scored with the injected
//! similarity backend, and the best candidate above the threshold wins. An
//! exact case-insensitive comparison is the fallback when fuzzy matching is
//! unavailable or inconclusive.

use super::similarity::normalize_name;
use super::SimilarityBackend;
use crate::models::MatchScorer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Minimum similarity for a fuzzy match to be accepted.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// A resolved scorer with the similarity that produced the match.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerMatch {
    pub scorer_id: Uuid,
    pub player_full_name: String,
    pub goals_count: i32,
    pub similarity: f64,
}

pub struct ScorerMatcher {
    backend: Arc<dyn SimilarityBackend>,
    threshold: f64,
    unavailable_logged: AtomicBool,
}

impl ScorerMatcher {
    pub fn new(backend: Arc<dyn SimilarityBackend>) -> Self {
        Self {
            backend,
            threshold: SIMILARITY_THRESHOLD,
            unavailable_logged: AtomicBool::new(false),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Find the actual scorer a predicted name refers to, if any.
    ///
    /// Candidates from other teams are never considered, regardless of how
    /// similar their names are.
    pub fn find_match(
        &self,
        predicted_name: &str,
        candidates: &[MatchScorer],
        team_id: Uuid,
    ) -> Option<ScorerMatch> {
        let team_scorers: Vec<&MatchScorer> =
            candidates.iter().filter(|s| s.team_id == team_id).collect();

        if team_scorers.is_empty() {
            return None;
        }

        if self.backend.is_available() {
            let best = team_scorers
                .iter()
                .map(|s| (*s, self.backend.score(predicted_name, &s.player_full_name)))
                .filter(|(_, similarity)| *similarity >= self.threshold)
                .max_by(|(_, a), (_, b)| a.total_cmp(b));

            if let Some((scorer, similarity)) = best {
                debug!(
                    "Fuzzy match: \"{}\" -> \"{}\" (similarity: {:.2})",
                    predicted_name, scorer.player_full_name, similarity
                );
                return Some(ScorerMatch {
                    scorer_id: scorer.id,
                    player_full_name: scorer.player_full_name.clone(),
                    goals_count: scorer.goals_count,
                    similarity,
                });
            }
        } else if !self.unavailable_logged.swap(true, Ordering::Relaxed) {
            warn!(
                "Similarity backend \"{}\" unavailable; scorer matching falls back to exact names",
                self.backend.backend_name()
            );
        }

        // Exact case-insensitive fallback
        let predicted_norm = normalize_name(predicted_name);
        team_scorers
            .iter()
            .find(|s| normalize_name(&s.player_full_name) == predicted_norm)
            .map(|s| {
                debug!(
                    "Exact match: \"{}\" -> \"{}\"",
                    predicted_name, s.player_full_name
                );
                ScorerMatch {
                    scorer_id: s.id,
                    player_full_name: s.player_full_name.clone(),
                    goals_count: s.goals_count,
                    similarity: 1.0,
                }
            })
    }
}
