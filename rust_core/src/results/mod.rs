//! Result submission boundary.
//!
//! Persists the result transactionally first (commit), then enqueues the
//! scoring job as a separate, time-bounded step. An enqueue failure is
//! captured on the report as a warning; it never rolls back or fails the
//! already-committed result.

use crate::error::{ProdeError, Result};
use crate::models::{MatchResult, MatchScorer};
use crate::queue::{Job, JobQueue};
use crate::store::{MatchResultInput, NewMatchScorer, Store};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResultSubmission {
    pub result: MatchResult,
    /// False when the scoring job could not be queued; the result itself
    /// is durably saved either way.
    pub scoring_enqueued: bool,
    pub warning: Option<String>,
}

pub struct ResultsService {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
}

impl ResultsService {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>) -> Self {
        Self { store, queue }
    }

    pub async fn submit_match_result(
        &self,
        match_id: Uuid,
        input: MatchResultInput,
    ) -> Result<ResultSubmission> {
        self.store
            .match_by_id(match_id)
            .await?
            .ok_or_else(|| ProdeError::not_found("match"))?;

        let result = self
            .store
            .submit_match_result(match_id, &input, Utc::now())
            .await?;
        info!("Result saved for match {}", match_id);

        // The result is committed; from here the queue can only degrade
        // the request, not fail it.
        match self.queue.enqueue(Job::CalculateScores { match_id }).await {
            Ok(()) => Ok(ResultSubmission {
                result,
                scoring_enqueued: true,
                warning: None,
            }),
            Err(e) => {
                warn!(
                    "Result saved but scoring job not enqueued for match {}: {:#}",
                    match_id, e
                );
                Ok(ResultSubmission {
                    result,
                    scoring_enqueued: false,
                    warning: Some(format!(
                        "result saved, but scoring could not be scheduled: {}",
                        e
                    )),
                })
            }
        }
    }

    pub async fn add_match_scorer(
        &self,
        match_id: Uuid,
        scorer: NewMatchScorer,
    ) -> Result<MatchScorer> {
        let m = self
            .store
            .match_by_id(match_id)
            .await?
            .ok_or_else(|| ProdeError::not_found("match"))?;

        let result = self
            .store
            .match_result(match_id)
            .await?
            .ok_or_else(|| {
                ProdeError::InvalidInput(
                    "match result must be created before adding scorers".to_string(),
                )
            })?;

        if scorer.team_id != m.team_a_id && scorer.team_id != m.team_b_id {
            return Err(ProdeError::InvalidInput(
                "team must be one of the teams playing in this match".to_string(),
            ));
        }

        Ok(self
            .store
            .add_match_scorer(result.result.id, &scorer)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Match, MatchStatus};
    use crate::queue::MemoryJobQueue;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    struct Fixture {
        store: Arc<MemoryStore>,
        queue: Arc<MemoryJobQueue>,
        service: ResultsService,
        match_id: Uuid,
        team_a: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let match_id = Uuid::new_v4();
        let team_a = Uuid::new_v4();

        store.insert_match(Match {
            id: match_id,
            competition_id: Uuid::new_v4(),
            team_a_id: team_a,
            team_b_id: Uuid::new_v4(),
            kickoff: chrono::Utc.with_ymd_and_hms(2026, 6, 10, 15, 0, 0).unwrap(),
            status: MatchStatus::InProgress,
            stage: "Final".to_string(),
            location: None,
        });

        let service = ResultsService::new(store.clone(), queue.clone());
        Fixture {
            store,
            queue,
            service,
            match_id,
            team_a,
        }
    }

    fn input() -> MatchResultInput {
        MatchResultInput {
            goals_team_a: 3,
            goals_team_b: 3,
            yellow_cards_team_a: Some(2),
            yellow_cards_team_b: Some(4),
            red_cards_team_a: None,
            red_cards_team_b: None,
        }
    }

    #[tokio::test]
    async fn test_submission_persists_then_enqueues() {
        let fixture = fixture();

        let submission = fixture
            .service
            .submit_match_result(fixture.match_id, input())
            .await
            .unwrap();

        assert!(submission.scoring_enqueued);
        assert!(submission.warning.is_none());
        assert_eq!(submission.result.goals_team_a, 3);

        let m = fixture.store.match_by_id(fixture.match_id).await.unwrap().unwrap();
        assert_eq!(m.status, MatchStatus::Finished);

        let job = fixture.queue.pop().unwrap();
        assert_eq!(
            job.job,
            Job::CalculateScores {
                match_id: fixture.match_id
            }
        );
    }

    #[tokio::test]
    async fn test_queue_outage_degrades_to_warning() {
        let fixture = fixture();
        fixture.queue.set_unavailable(true);

        let submission = fixture
            .service
            .submit_match_result(fixture.match_id, input())
            .await
            .unwrap();

        assert!(!submission.scoring_enqueued);
        assert!(submission.warning.is_some());

        // The primary effect still happened
        let saved = fixture.store.match_result(fixture.match_id).await.unwrap();
        assert!(saved.is_some());
    }

    #[tokio::test]
    async fn test_unknown_match_is_not_found() {
        let fixture = fixture();
        let err = fixture
            .service
            .submit_match_result(Uuid::new_v4(), input())
            .await
            .unwrap_err();
        assert!(matches!(err, ProdeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_scorer_requires_result_and_valid_team() {
        let fixture = fixture();
        let scorer = NewMatchScorer {
            player_full_name: "Lionel Messi".to_string(),
            team_id: fixture.team_a,
            goals_count: 2,
        };

        // No result yet
        assert!(matches!(
            fixture
                .service
                .add_match_scorer(fixture.match_id, scorer.clone())
                .await,
            Err(ProdeError::InvalidInput(_))
        ));

        fixture
            .service
            .submit_match_result(fixture.match_id, input())
            .await
            .unwrap();

        // Team not playing in this match
        assert!(matches!(
            fixture
                .service
                .add_match_scorer(
                    fixture.match_id,
                    NewMatchScorer {
                        team_id: Uuid::new_v4(),
                        ..scorer.clone()
                    }
                )
                .await,
            Err(ProdeError::InvalidInput(_))
        ));

        let row = fixture
            .service
            .add_match_scorer(fixture.match_id, scorer)
            .await
            .unwrap();
        assert_eq!(row.player_full_name, "Lionel Messi");

        let bundle = fixture.store.match_result(fixture.match_id).await.unwrap().unwrap();
        assert_eq!(bundle.scorers.len(), 1);
    }
}
