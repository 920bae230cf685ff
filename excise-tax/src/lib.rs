//! Federal beer excise tax
//!
//! Allocates taxable removals across the tiered CBMA rate bands.
//!
//! # Algorithm
//!
//! Bands are filled in ascending order against the brewery's year-to-date
//! taxable barrels:
//!
//! ```text
//! remaining_capacity = band_ceiling − ytd_cursor   (clipped to [0, left])
//! qty                = min(remaining_capacity, left)
//! tax_cents          = round(qty × rate_cents_per_bbl)
//! ```
//!
//! Quantities are exact decimals and money is integer cents, so the sum of
//! band quantities always equals the taxable removals.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod bands;
pub mod calculator;
pub mod counter;
pub mod error;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use bands::{BandConfig, BandId, RateTable, RoundingMode};
pub use calculator::{Allocation, ExciseCalculator, RateBand};
pub use counter::CbmaCounter;
pub use config::ExciseConfig;
