//! Prode Core - Scoring and ranking engine for the prediction-pool platform.
//!
//! This module provides:
//! - Variable scoring rules and the match scoring engine
//! - Fuzzy scorer-name matching with pluggable similarity backends
//! - Durable scoring-job queue over Redis with bounded enqueue
//! - Predictions lock sweep for imminent matches
//! - Individual, by-area, and inter-area ranking aggregation with a TTL
//!   cache and scoring-driven invalidation
//! - Postgres and in-memory store backends behind one trait

pub mod cache;
pub mod db;
pub mod error;
pub mod locking;
pub mod matching;
pub mod models;
pub mod queue;
pub mod ranking;
pub mod redis;
pub mod results;
pub mod scoring;
pub mod store;

pub use error::{ProdeError, Result};
