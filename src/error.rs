use crate::config::ConfigError;
use crate::engine::TransitionError;
use crate::notify::NotificationTableError;
use crate::rules::RuleTableError;
use crate::store::PersistenceError;
use thiserror::Error;

/// Errors surfaced by the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Invalid rule table: {0}")]
    RuleTable(#[from] RuleTableError),

    #[error("Invalid notification table: {0}")]
    NotificationTable(#[from] NotificationTableError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Job '{job}' failed: {reason}")]
    Job { job: String, reason: String },

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
