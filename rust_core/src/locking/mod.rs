//! Predictions lock sweep.
//!
//! Freezes predictions shortly before kickoff so no edit can race the
//! scoring pipeline. The sweep is a plain function of an injected `now`:
//! the periodic driver in the worker calls it on an interval, and the same
//! entry point doubles as the manual/administrative trigger.

use crate::store::Store;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Lock window relative to the sweep time. Matches with kickoff inside
/// `[now + lead_min, now + lead_max]` have their predictions locked.
#[derive(Debug, Clone, Copy)]
pub struct LockWindow {
    pub lead_min: Duration,
    pub lead_max: Duration,
}

impl Default for LockWindow {
    fn default() -> Self {
        Self {
            lead_min: Duration::minutes(5),
            lead_max: Duration::minutes(60),
        }
    }
}

impl LockWindow {
    /// The window must be wider than the sweep period, otherwise a match
    /// could pass through between two runs without ever being inside it.
    pub fn covers_period(&self, period: std::time::Duration) -> bool {
        let width = self.lead_max - self.lead_min;
        width.to_std().map(|w| w > period).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockSweepReport {
    pub matches_found: usize,
    pub predictions_locked: u64,
}

pub struct LockSweep {
    store: Arc<dyn Store>,
    window: LockWindow,
}

impl LockSweep {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            window: LockWindow::default(),
        }
    }

    pub fn with_window(mut self, window: LockWindow) -> Self {
        self.window = window;
        self
    }

    /// One sweep at `now`. Idempotent: the store only locks predictions
    /// whose `locked_at` is still null, so re-running the same window does
    /// nothing twice.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<LockSweepReport> {
        let from = now + self.window.lead_min;
        let to = now + self.window.lead_max;

        let matches = self
            .store
            .scheduled_matches_with_kickoff_between(from, to)
            .await?;

        if matches.is_empty() {
            debug!("No matches to lock predictions for");
            return Ok(LockSweepReport::default());
        }

        info!("Found {} matches entering the lock window", matches.len());

        let mut report = LockSweepReport {
            matches_found: matches.len(),
            predictions_locked: 0,
        };

        for m in &matches {
            let locked = self.store.lock_unlocked_predictions(m.id, now).await?;
            if locked > 0 {
                info!("Locked {} predictions for match {}", locked, m.id);
            }
            report.predictions_locked += locked;
        }

        Ok(report)
    }
}
