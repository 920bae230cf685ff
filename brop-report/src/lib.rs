//! BROP reporting service
//!
//! Drives reporting periods through their lifecycle: draft generation from
//! the movement log, reconciliation, CBMA band allocation and the one-time
//! freeze into an immutable, content-hashed snapshot.
//!
//! # Lifecycle
//!
//! ```text
//! open ──generate──▶ draft ──generate──▶ draft ──finalize──▶ finalized
//! ```
//!
//! Finalization is a compare-and-swap on the draft revision: two concurrent
//! finalize calls for the same period produce exactly one snapshot.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod materializer;
pub mod metrics;
pub mod service;
pub mod store;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use materializer::{Materializer, PeriodSnapshot};
pub use metrics::Metrics;
pub use service::{FinalizeRequest, PeriodReport, ReportService};
pub use store::{DraftReport, InMemoryPeriodStore, PeriodStore};
