use thiserror::Error;
use uuid::Uuid;

use crate::models::MatchStatus;

#[derive(Error, Debug)]
pub enum PostHereError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid match status transition: {from} -> {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("Report {0} not found")]
    NotFound(Uuid),

    #[error("Session for {0} was modified concurrently")]
    SessionConflict(String),

    #[error("Other error: {0}")]
    Other(String),
}
