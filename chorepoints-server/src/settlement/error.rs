use rust_decimal::Decimal;

use crate::storage::StorageError;

/// Failures of a settlement step.
///
/// The orchestrator skips the affected entity for recoverable variants and
/// aborts the run for everything else.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// A configuration key the run depends on is absent.
    #[error("missing configuration key: {0}")]
    MissingConfig(&'static str),

    /// A penalty percentage outside `0..=100`.
    #[error("penalty {percent}% is outside 0-100")]
    InvalidPenalty { percent: Decimal },

    /// A child, chore or claim vanished while the run was using it.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Storage(StorageError),
}

impl SettlementError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SettlementError::InvalidPenalty { .. } | SettlementError::NotFound { .. }
        )
    }

    /// Short machine-friendly tag used in logs and run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SettlementError::MissingConfig(_) => "missing_config",
            SettlementError::InvalidPenalty { .. } => "invalid_penalty",
            SettlementError::NotFound { .. } => "not_found",
            SettlementError::Storage(_) => "storage",
        }
    }
}

impl From<StorageError> for SettlementError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound { kind, id } => SettlementError::NotFound { kind, id },
            other => SettlementError::Storage(other),
        }
    }
}

impl From<diesel::result::Error> for SettlementError {
    fn from(value: diesel::result::Error) -> Self {
        SettlementError::Storage(StorageError::Database(value))
    }
}

impl From<diesel::r2d2::PoolError> for SettlementError {
    fn from(value: diesel::r2d2::PoolError) -> Self {
        SettlementError::Storage(StorageError::Pool(value))
    }
}

impl From<tokio::task::JoinError> for SettlementError {
    fn from(value: tokio::task::JoinError) -> Self {
        SettlementError::Storage(StorageError::Task(value))
    }
}
