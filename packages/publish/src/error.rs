use crate::diagnostics::PreflightOutcome;
use dve_store::StoreError;
use thiserror::Error;

pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("No rollback target available.")]
    NoRollbackTarget,

    #[error("Preflight blocked publish.")]
    PreflightBlocked(Box<PreflightOutcome>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl PublishError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}
