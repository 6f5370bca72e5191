//! Ranking cache seam.
//!
//! The cache is a disposable accelerator: every failure is logged by the
//! ranking service and the read proceeds against the store. Payloads are
//! JSON strings; keys are built by the ranking service.

use crate::redis::RedisBus;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

/// Default time-to-live for cached rankings.
pub const DEFAULT_RANKING_TTL: Duration = Duration::from_secs(300);

#[async_trait]
pub trait RankingCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, keys: &[String]) -> Result<()>;
}

// ============================================================================
// Redis backend
// ============================================================================

pub struct RedisRankingCache {
    bus: RedisBus,
}

impl RedisRankingCache {
    pub fn new(bus: RedisBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl RankingCache for RedisRankingCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.bus.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.bus.set_ex(key, value, ttl.as_secs().max(1)).await
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        self.bus.del(keys).await
    }
}

// ============================================================================
// In-memory backend (tests, paper runs)
// ============================================================================

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<FxHashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl RankingCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        let hit = entries
            .get(key)
            .map(|(value, expires_at)| (value.clone(), *expires_at));
        match hit {
            Some((value, expires_at)) if expires_at > Instant::now() => Ok(Some(value)),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}
