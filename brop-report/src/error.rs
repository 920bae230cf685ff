//! Error types for the reporting service

use brop_ledger::PeriodStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for reporting operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reporting errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(brop_ledger::Error),

    /// Excise calculation error
    #[error("Excise error: {0}")]
    Excise(#[from] excise_tax::Error),

    /// Period is finalized; its snapshot can no longer change
    #[error("Period {0} is already finalized")]
    AlreadyFinalized(Uuid),

    /// Unknown period
    #[error("Period not found: {0}")]
    PeriodNotFound(Uuid),

    /// Period overlaps an existing period of the same workspace
    #[error("Period overlaps existing period {existing}")]
    PeriodOverlap {
        /// Period already covering part of the range
        existing: Uuid,
    },

    /// No draft has been generated for the period
    #[error("No draft exists for period {0}")]
    DraftMissing(Uuid),

    /// Draft was regenerated after the caller reviewed it
    #[error("Stale draft for period {period_id}: expected revision {expected}, current {current}")]
    StaleDraft {
        /// Period being finalized
        period_id: Uuid,
        /// Revision the caller reviewed
        expected: u64,
        /// Revision currently stored
        current: u64,
    },

    /// Operation not valid in the period's current status
    #[error("Period {period_id} is {status}: {detail}")]
    InvalidTransition {
        /// Period
        period_id: Uuid,
        /// Current status
        status: PeriodStatus,
        /// What was attempted
        detail: String,
    },

    /// Draft has anomalies that were not acknowledged
    #[error("Period {period_id} needs review: {anomalies} anomalies, variance valid = {is_valid}")]
    ConfirmationRequired {
        /// Period
        period_id: Uuid,
        /// Number of anomalies on the draft
        anomalies: usize,
        /// Whether the variance was within tolerance
        is_valid: bool,
    },

    /// Snapshot inputs do not describe the same period
    #[error("Inconsistent snapshot input: {0}")]
    Inconsistent(String),

    /// Snapshot content does not match its recorded hash
    #[error("Snapshot integrity check failed for period {0}")]
    Integrity(Uuid),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<brop_ledger::Error> for Error {
    fn from(err: brop_ledger::Error) -> Self {
        match err {
            brop_ledger::Error::AlreadyFinalized(period_id) => Error::AlreadyFinalized(period_id),
            other => Error::Ledger(other),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
