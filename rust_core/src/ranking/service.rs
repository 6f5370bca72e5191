//! Ranking service.
//!
//! Reads are gated on the prode's ranking-config flags, served from the
//! cache when fresh, and recomputed from PredictionScore-derived standings
//! on miss. The cache is never load-bearing: any cache failure on the read
//! path is logged and the read falls through to the store.

use super::{
    AreaMember, AreaRanking, AreaRankingEntry, IndividualRanking, IndividualRankingEntry,
    RankingKind, RankingMetadata,
};
use crate::cache::{RankingCache, DEFAULT_RANKING_TTL};
use crate::error::{ProdeError, Result};
use crate::models::{AreaRankingCalculation, Prode, ProdeRankingConfig};
use crate::store::{ParticipantStanding, Store};
use chrono::Utc;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub struct RankingService {
    store: Arc<dyn Store>,
    cache: Arc<dyn RankingCache>,
    ttl: Duration,
}

impl RankingService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn RankingCache>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_RANKING_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn individual_general_ranking(&self, prode_id: Uuid) -> Result<IndividualRanking> {
        let (prode, config) = self.authorize(prode_id).await?;
        if !config.show_individual_general {
            return Err(ProdeError::forbidden(
                "individual general ranking is not enabled for this prode",
            ));
        }

        let key = RankingKind::IndividualGeneral.cache_key(prode_id);
        if let Some(cached) = self.cache_get::<IndividualRanking>(&key).await {
            return Ok(IndividualRanking {
                metadata: RankingMetadata {
                    is_cached: true,
                    ..cached.metadata
                },
                ..cached
            });
        }

        let standings = self.store.participant_standings(prode_id, None).await?;
        let ranking = IndividualRanking {
            metadata: self.metadata(&prode, standings.len()),
            ranking: rank_individuals(standings),
        };

        self.cache_set(&key, &ranking).await;
        Ok(ranking)
    }

    /// Individual ranking scoped to the area of the requesting employee.
    pub async fn individual_area_ranking(
        &self,
        prode_id: Uuid,
        employee_id: Uuid,
    ) -> Result<IndividualRanking> {
        let (prode, config) = self.authorize(prode_id).await?;
        if !config.show_individual_by_area {
            return Err(ProdeError::forbidden(
                "individual area ranking is not enabled for this prode",
            ));
        }

        let employee = self
            .store
            .employee_by_id(employee_id)
            .await?
            .ok_or_else(|| ProdeError::not_found("employee"))?;
        let area_id = employee.company_area_id;

        let key = RankingKind::IndividualByArea(area_id).cache_key(prode_id);
        if let Some(cached) = self.cache_get::<IndividualRanking>(&key).await {
            return Ok(IndividualRanking {
                metadata: RankingMetadata {
                    is_cached: true,
                    ..cached.metadata
                },
                ..cached
            });
        }

        let standings = self
            .store
            .participant_standings(prode_id, Some(area_id))
            .await?;
        let ranking = IndividualRanking {
            metadata: self.metadata(&prode, standings.len()),
            ranking: rank_individuals(standings),
        };

        self.cache_set(&key, &ranking).await;
        Ok(ranking)
    }

    /// Inter-area ranking: areas against each other, with each area's
    /// top-3 members surfaced.
    pub async fn area_ranking(&self, prode_id: Uuid) -> Result<AreaRanking> {
        let (prode, config) = self.authorize(prode_id).await?;
        if !config.show_area_ranking {
            return Err(ProdeError::forbidden(
                "area ranking is not enabled for this prode",
            ));
        }

        let key = RankingKind::Area.cache_key(prode_id);
        if let Some(cached) = self.cache_get::<AreaRanking>(&key).await {
            return Ok(AreaRanking {
                metadata: RankingMetadata {
                    is_cached: true,
                    ..cached.metadata
                },
                ..cached
            });
        }

        let standings = self.store.participant_standings(prode_id, None).await?;
        let ranking = AreaRanking {
            metadata: self.metadata(&prode, standings.len()),
            ranking: rank_areas(standings, config.area_ranking_calculation),
        };

        self.cache_set(&key, &ranking).await;
        Ok(ranking)
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    /// Delete every cached ranking of one prode: the general and inter-area
    /// keys plus one by-area key per area with at least one participant.
    /// Called after scoring; a failure here propagates so the job is
    /// redelivered rather than leaving stale rankings in place.
    pub async fn invalidate_cache(&self, prode_id: Uuid) -> Result<()> {
        let mut keys = vec![
            RankingKind::IndividualGeneral.cache_key(prode_id),
            RankingKind::Area.cache_key(prode_id),
        ];
        for area_id in self.store.participant_area_ids(prode_id).await? {
            keys.push(RankingKind::IndividualByArea(area_id).cache_key(prode_id));
        }

        self.cache.delete(&keys).await?;
        info!("Invalidated {} ranking cache keys for prode {}", keys.len(), prode_id);
        Ok(())
    }

    /// Invalidate rankings of every prode tied to the match's competition.
    /// A missing match invalidates nothing.
    pub async fn invalidate_caches_for_match(&self, match_id: Uuid) -> Result<()> {
        let Some(m) = self.store.match_by_id(match_id).await? else {
            return Ok(());
        };

        for prode_id in self
            .store
            .prode_ids_for_competition(m.competition_id)
            .await?
        {
            self.invalidate_cache(prode_id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn authorize(&self, prode_id: Uuid) -> Result<(Prode, ProdeRankingConfig)> {
        let prode = self
            .store
            .prode_by_id(prode_id)
            .await?
            .ok_or_else(|| ProdeError::not_found("prode"))?;

        if !prode.is_active {
            return Err(ProdeError::forbidden("prode is not active"));
        }

        // No ranking config means nothing is exposed
        let config = self
            .store
            .ranking_config(prode_id)
            .await?
            .ok_or_else(|| ProdeError::forbidden("rankings are not configured for this prode"))?;

        Ok((prode, config))
    }

    fn metadata(&self, prode: &Prode, total_participants: usize) -> RankingMetadata {
        RankingMetadata {
            prode_id: prode.id,
            prode_name: prode.name.clone(),
            total_participants,
            last_updated: Utc::now(),
            is_cached: false,
        }
    }

    async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {:#}. Computing directly", key, e);
                None
            }
        }
    }

    async fn cache_set<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize ranking for cache {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &payload, self.ttl).await {
            warn!("Cache write failed for {}: {:#}", key, e);
        }
    }
}

/// Sort standings into a 1-based individual ranking. Ties on total points
/// are broken by ascending participant id so the order is deterministic.
fn rank_individuals(mut standings: Vec<ParticipantStanding>) -> Vec<IndividualRankingEntry> {
    standings.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(a.participant_id.cmp(&b.participant_id))
    });

    standings
        .into_iter()
        .enumerate()
        .map(|(index, s)| IndividualRankingEntry {
            employee_id: s.employee_id,
            employee_name: s.employee_name,
            area_name: s.area_name,
            total_points: s.total_points,
            predictions_count: s.predictions_count,
            position: index as u32 + 1,
        })
        .collect()
}

/// Group standings by area, reduce each group by sum or average, and rank
/// the areas. The average divides by the area's participant count and
/// rounds to the nearest point.
fn rank_areas(
    standings: Vec<ParticipantStanding>,
    calculation: AreaRankingCalculation,
) -> Vec<AreaRankingEntry> {
    struct AreaGroup {
        area_name: String,
        members: Vec<ParticipantStanding>,
    }

    let mut groups: FxHashMap<Uuid, AreaGroup> = FxHashMap::default();
    for standing in standings {
        groups
            .entry(standing.area_id)
            .or_insert_with(|| AreaGroup {
                area_name: standing.area_name.clone(),
                members: Vec::new(),
            })
            .members
            .push(standing);
    }

    let mut entries: Vec<AreaRankingEntry> = groups
        .into_iter()
        .map(|(area_id, mut group)| {
            let sum: i64 = group.members.iter().map(|m| m.total_points).sum();
            let total_points = match calculation {
                AreaRankingCalculation::Sum => sum,
                AreaRankingCalculation::Average => {
                    if group.members.is_empty() {
                        0
                    } else {
                        (sum as f64 / group.members.len() as f64).round() as i64
                    }
                }
            };

            group.members.sort_by(|a, b| {
                b.total_points
                    .cmp(&a.total_points)
                    .then(a.participant_id.cmp(&b.participant_id))
            });
            let top_employees = group
                .members
                .iter()
                .take(3)
                .map(|m| AreaMember {
                    employee_id: m.employee_id,
                    employee_name: m.employee_name.clone(),
                    total_points: m.total_points,
                })
                .collect();

            AreaRankingEntry {
                area_id,
                area_name: group.area_name,
                total_points,
                participants_count: group.members.len(),
                top_employees,
                position: 0,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(a.area_id.cmp(&b.area_id))
    });
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index as u32 + 1;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{
        CompanyArea, Employee, Match, MatchStatus, Prediction, PredictionScore, PointsBreakdown,
        Prode, ProdeParticipant, VariableCode,
    };
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FailingCache;

    #[async_trait]
    impl RankingCache for FailingCache {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("cache down"))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> anyhow::Result<()> {
            Err(anyhow!("cache down"))
        }

        async fn delete(&self, _keys: &[String]) -> anyhow::Result<()> {
            Err(anyhow!("cache down"))
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        prode_id: Uuid,
        competition_id: Uuid,
        area_eng: Uuid,
        area_sales: Uuid,
        employees: Vec<Uuid>,
    }

    /// Three participants: two in engineering (30 and 10 points), one in
    /// sales (20 points). One prediction with a score per participant.
    async fn fixture(calculation: AreaRankingCalculation) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let competition_id = Uuid::new_v4();
        let prode_id = Uuid::new_v4();

        store.insert_prode(Prode {
            id: prode_id,
            company_id: Uuid::new_v4(),
            competition_id,
            name: "Office pool".to_string(),
            is_active: true,
        });
        store.insert_ranking_config(ProdeRankingConfig {
            prode_id,
            show_individual_general: true,
            show_individual_by_area: true,
            show_area_ranking: true,
            area_ranking_calculation: calculation,
        });

        let area_eng = Uuid::new_v4();
        let area_sales = Uuid::new_v4();
        store.insert_area(CompanyArea {
            id: area_eng,
            name: "Engineering".to_string(),
        });
        store.insert_area(CompanyArea {
            id: area_sales,
            name: "Sales".to_string(),
        });

        let match_id = Uuid::new_v4();
        store.insert_match(Match {
            id: match_id,
            competition_id,
            team_a_id: Uuid::new_v4(),
            team_b_id: Uuid::new_v4(),
            kickoff: Utc.with_ymd_and_hms(2026, 6, 10, 15, 0, 0).unwrap(),
            status: MatchStatus::Finished,
            stage: "Group".to_string(),
            location: None,
        });

        let mut employees = Vec::new();
        for (i, (name, area, points)) in [
            ("Ada Lovelace", area_eng, 30i64),
            ("Grace Hopper", area_eng, 10),
            ("Elon Seller", area_sales, 20),
        ]
        .iter()
        .enumerate()
        {
            let employee_id = Uuid::new_v4();
            let (first, last) = name.split_once(' ').unwrap();
            store.insert_employee(Employee {
                id: employee_id,
                first_name: first.to_string(),
                last_name: last.to_string(),
                company_area_id: *area,
            });

            // Participant ids ascending with insertion order for a stable
            // tie-break in tests
            let participant_id = Uuid::from_u128(i as u128 + 1);
            store.insert_participant(ProdeParticipant {
                id: participant_id,
                prode_id,
                employee_id,
            });

            let prediction_id = Uuid::new_v4();
            store.insert_prediction(Prediction {
                id: prediction_id,
                prode_participant_id: participant_id,
                match_id,
                predicted_goals_team_a: Some(1),
                predicted_goals_team_b: Some(0),
                predicted_yellow_cards_team_a: None,
                predicted_yellow_cards_team_b: None,
                predicted_red_cards_team_a: None,
                predicted_red_cards_team_b: None,
                predicted_winner_team_id: None,
                locked_at: None,
            });

            let mut breakdown = PointsBreakdown::new();
            breakdown.award(VariableCode::ExactResult, *points);
            let score = PredictionScore::new(prediction_id, breakdown, Utc::now());
            store.upsert_prediction_score(&score).await.unwrap();

            employees.push(employee_id);
        }

        Fixture {
            store,
            prode_id,
            competition_id,
            area_eng,
            area_sales,
            employees,
        }
    }

    fn service(store: Arc<MemoryStore>, cache: Arc<dyn RankingCache>) -> RankingService {
        RankingService::new(store, cache)
    }

    #[test]
    fn test_tie_break_by_participant_id() {
        let standing = |id: u128, points: i64| ParticipantStanding {
            participant_id: Uuid::from_u128(id),
            employee_id: Uuid::from_u128(id + 100),
            employee_name: format!("Participant {}", id),
            area_id: Uuid::from_u128(1000),
            area_name: "Engineering".to_string(),
            total_points: points,
            predictions_count: 1,
        };

        // Two tied participants arrive in reverse id order
        let ranked = rank_individuals(vec![standing(2, 10), standing(1, 10), standing(3, 20)]);

        assert_eq!(ranked[0].total_points, 20);
        assert_eq!(ranked[1].employee_id, Uuid::from_u128(101));
        assert_eq!(ranked[2].employee_id, Uuid::from_u128(102));
        let positions: Vec<u32> = ranked.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_general_ranking_order_and_positions() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let service = service(fixture.store.clone(), Arc::new(MemoryCache::new()));

        let ranking = service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();

        assert!(!ranking.metadata.is_cached);
        assert_eq!(ranking.metadata.total_participants, 3);
        let points: Vec<i64> = ranking.ranking.iter().map(|e| e.total_points).collect();
        assert_eq!(points, vec![30, 20, 10]);
        let positions: Vec<u32> = ranking.ranking.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(ranking.ranking[0].employee_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_second_read_is_cached() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let service = service(fixture.store.clone(), Arc::new(MemoryCache::new()));

        let first = service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();
        assert!(!first.metadata.is_cached);

        let second = service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();
        assert!(second.metadata.is_cached);
        assert_eq!(first.ranking, second.ranking);
    }

    #[tokio::test]
    async fn test_area_scoped_ranking() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let service = service(fixture.store.clone(), Arc::new(MemoryCache::new()));

        // Requested by Grace (engineering): only engineering shows up
        let ranking = service
            .individual_area_ranking(fixture.prode_id, fixture.employees[1])
            .await
            .unwrap();
        assert_eq!(ranking.ranking.len(), 2);
        assert!(ranking.ranking.iter().all(|e| e.area_name == "Engineering"));
        assert_eq!(ranking.ranking[0].total_points, 30);
    }

    #[tokio::test]
    async fn test_area_ranking_sum_and_top_members() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let service = service(fixture.store.clone(), Arc::new(MemoryCache::new()));

        let ranking = service.area_ranking(fixture.prode_id).await.unwrap();
        assert_eq!(ranking.ranking.len(), 2);

        let eng = &ranking.ranking[0];
        assert_eq!(eng.area_id, fixture.area_eng);
        assert_eq!(eng.total_points, 40); // 30 + 10
        assert_eq!(eng.position, 1);
        assert_eq!(eng.participants_count, 2);
        assert_eq!(eng.top_employees.len(), 2);
        assert_eq!(eng.top_employees[0].total_points, 30);

        let sales = &ranking.ranking[1];
        assert_eq!(sales.area_id, fixture.area_sales);
        assert_eq!(sales.total_points, 20);
    }

    #[tokio::test]
    async fn test_area_ranking_average() {
        let fixture = fixture(AreaRankingCalculation::Average).await;
        let service = service(fixture.store.clone(), Arc::new(MemoryCache::new()));

        let ranking = service.area_ranking(fixture.prode_id).await.unwrap();
        // Engineering averages (30+10)/2 = 20, Sales 20/1 = 20: tie broken
        // by area id
        assert!(ranking.ranking.iter().all(|e| e.total_points == 20));
        let expected_first = fixture.area_eng.min(fixture.area_sales);
        assert_eq!(ranking.ranking[0].area_id, expected_first);
    }

    #[tokio::test]
    async fn test_gating() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let service = service(fixture.store.clone(), Arc::new(MemoryCache::new()));

        // Unknown prode
        assert!(matches!(
            service.individual_general_ranking(Uuid::new_v4()).await,
            Err(ProdeError::NotFound { .. })
        ));

        // Disabled flag
        fixture.store.insert_ranking_config(ProdeRankingConfig {
            prode_id: fixture.prode_id,
            show_individual_general: true,
            show_individual_by_area: true,
            show_area_ranking: false,
            area_ranking_calculation: AreaRankingCalculation::Sum,
        });
        assert!(matches!(
            service.area_ranking(fixture.prode_id).await,
            Err(ProdeError::Forbidden(_))
        ));

        // Inactive prode is forbidden for every kind
        fixture.store.insert_prode(Prode {
            id: fixture.prode_id,
            company_id: Uuid::new_v4(),
            competition_id: fixture.competition_id,
            name: "Office pool".to_string(),
            is_active: false,
        });
        assert!(matches!(
            service.individual_general_ranking(fixture.prode_id).await,
            Err(ProdeError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidation_forces_recompute() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let cache = Arc::new(MemoryCache::new());
        let service = service(fixture.store.clone(), cache.clone());

        service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();
        service.area_ranking(fixture.prode_id).await.unwrap();
        service
            .individual_area_ranking(fixture.prode_id, fixture.employees[0])
            .await
            .unwrap();
        assert_eq!(cache.len(), 3);

        service.invalidate_cache(fixture.prode_id).await.unwrap();
        assert!(cache.is_empty());

        let ranking = service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();
        assert!(!ranking.metadata.is_cached);
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_direct_reads() {
        let fixture = fixture(AreaRankingCalculation::Sum).await;
        let service = service(fixture.store.clone(), Arc::new(FailingCache));

        let first = service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();
        let second = service
            .individual_general_ranking(fixture.prode_id)
            .await
            .unwrap();

        assert!(!first.metadata.is_cached);
        assert!(!second.metadata.is_cached);
        assert_eq!(first.ranking, second.ranking);
    }
}
