//! Brewer's Report of Operations ledger
//!
//! Volume movement log, reporting periods, period aggregation and the
//! BROP reconciliation engine.
//!
//! # Architecture
//!
//! 1. **Movement log**: every barrel entering or leaving bond is recorded once
//! 2. **Aggregation**: one entry per TTB line for a reporting period
//! 3. **Reconciliation**: opening + additions − removals must equal the
//!    physical closing count within tolerance
//!
//! # Invariants
//!
//! - Volume conservation: calculated closing == reported closing (± 0.01 bbl)
//! - Chained balances: opening of period N == closing of period N−1
//! - Deterministic: same movements → same ledger → same result

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod period;
pub mod log;
pub mod aggregator;
pub mod reconcile;
pub mod error;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Category, Direction, Movement, MovementSource, PeriodLedgerEntry, SourceKind, WorkspaceId,
};
pub use period::{Period, PeriodSchedule, PeriodStatus, PeriodType};
pub use log::{InMemoryMovementLog, MovementLog};
pub use aggregator::{Aggregator, Checkpoint, OpeningBalance, PeriodLedger};
pub use reconcile::{Anomaly, AnomalyKind, ReconciliationResult, Reconciler, Severity};
pub use config::{Config, DueDateConfig, ReconcileConfig};
