use std::path::PathBuf;
use thiserror::Error;

/// Rejected caller input. Nothing is written when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} must be a date in YYYY-MM-DD form, got '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error("{field} must be one of {allowed}, got '{value}'")]
    InvalidChoice {
        field: &'static str,
        value: String,
        allowed: &'static str,
    },

    #[error("{field} {reason}")]
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },
}

/// All possible errors in the ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Provider #{0} does not exist")]
    ProviderNotFound(i64),

    #[error("Check #{0} is already paid")]
    CheckAlreadyPaid(i64),

    #[error("{0} is too large to compute")]
    Overflow(&'static str),

    #[error("Backup source {0} does not exist")]
    BackupSourceMissing(PathBuf),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// True when the error is the caller's fault rather than the store's
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::ProviderNotFound(_)
                | LedgerError::CheckAlreadyPaid(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LedgerError>;
