//! Ranking aggregation: individual, by-area, and inter-area standings with
//! a TTL cache and explicit invalidation driven by the scoring pipeline.

pub mod service;

pub use service::RankingService;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three ranking reads a prode exposes. Each has its own cache key
/// space; the by-area variant is additionally keyed by the area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingKind {
    IndividualGeneral,
    IndividualByArea(Uuid),
    Area,
}

impl RankingKind {
    pub fn cache_key(&self, prode_id: Uuid) -> String {
        match self {
            RankingKind::IndividualGeneral => format!("ranking:{}:individual_general", prode_id),
            RankingKind::IndividualByArea(area_id) => {
                format!("ranking:{}:individual_by_area:{}", prode_id, area_id)
            }
            RankingKind::Area => format!("ranking:{}:area", prode_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingMetadata {
    pub prode_id: Uuid,
    pub prode_name: String,
    pub total_participants: usize,
    pub last_updated: DateTime<Utc>,
    pub is_cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRankingEntry {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub area_name: String,
    pub total_points: i64,
    pub predictions_count: i64,
    /// 1-based, assigned after the descending sort.
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRanking {
    pub metadata: RankingMetadata,
    pub ranking: Vec<IndividualRankingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaMember {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRankingEntry {
    pub area_id: Uuid,
    pub area_name: String,
    /// Sum or average of member totals, per the prode's configuration.
    pub total_points: i64,
    pub participants_count: usize,
    pub top_employees: Vec<AreaMember>,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRanking {
    pub metadata: RankingMetadata,
    pub ranking: Vec<AreaRankingEntry>,
}
