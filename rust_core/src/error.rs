//! Domain error taxonomy for the scoring and ranking core.
//!
//! Not-found and forbidden conditions are surfaced to callers verbatim.
//! Transient infrastructure failures are recovered locally (cache fallback,
//! enqueue warning) and only reach this type when a whole operation cannot
//! proceed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProdeError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Systemic store/queue failure; callers treat this as retriable.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl ProdeError {
    pub fn not_found(entity: &'static str) -> Self {
        ProdeError::NotFound { entity }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        ProdeError::Forbidden(reason.into())
    }

    /// True for errors a job queue should redeliver.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ProdeError::Infrastructure(_))
    }
}

pub type Result<T> = std::result::Result<T, ProdeError>;
