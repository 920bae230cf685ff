//! Error types for the BROP ledger

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Opening balance cannot be chained from a prior closing balance
    #[error("Data gap for {workspace} at {period_start}: {detail}")]
    DataGap {
        /// Workspace being aggregated
        workspace: String,
        /// First day of the period that cannot be chained
        period_start: NaiveDate,
        /// What is missing
        detail: String,
    },

    /// Period boundaries or type are invalid
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Movement rejected by the log
    #[error("Invalid movement: {0}")]
    InvalidMovement(String),

    /// Period is finalized and cannot change
    #[error("Period {0} is already finalized")]
    AlreadyFinalized(Uuid),

    /// Status transition not permitted
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
