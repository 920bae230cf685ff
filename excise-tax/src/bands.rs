//! CBMA rate bands
//!
//! Rates change by statute, so the table is data: loaded from configuration
//! and validated before any tax is computed.

use crate::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Rate band identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandId {
    /// First 60,000 barrels of the calendar year
    #[serde(rename = "first_60k")]
    First60k,
    /// 60,001 to 6,000,000 barrels
    #[serde(rename = "60k_to_6m")]
    SixtyKTo6m,
    /// Above 6,000,000 barrels
    #[serde(rename = "over_6m")]
    Over6m,
}

impl BandId {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            BandId::First60k => "first_60k",
            BandId::SixtyKTo6m => "60k_to_6m",
            BandId::Over6m => "over_6m",
        }
    }
}

impl fmt::Display for BandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Band identifier
    pub band_id: BandId,

    /// Cumulative annual ceiling; `None` for the open-ended top band
    #[serde(default)]
    pub ceiling_bbl: Option<Decimal>,

    /// Rate in cents per barrel
    pub rate_cents_per_bbl: i64,
}

/// Rounding applied to `qty × rate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Midpoint away from zero
    #[default]
    HalfUp,
    /// Midpoint to even (banker's rounding)
    HalfEven,
}

impl RoundingMode {
    fn strategy(&self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

/// Validated, ordered rate table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateTable {
    bands: Vec<BandConfig>,
    rounding: RoundingMode,
}

impl RateTable {
    /// Validate and build a table
    pub fn new(bands: Vec<BandConfig>, rounding: RoundingMode) -> Result<Self> {
        validate_bands(&bands)?;
        Ok(Self { bands, rounding })
    }

    /// 2025-era CBMA domestic rates
    pub fn cbma_2025() -> Self {
        Self {
            bands: default_bands(),
            rounding: RoundingMode::HalfUp,
        }
    }

    /// Bands in ascending order
    pub fn bands(&self) -> &[BandConfig] {
        &self.bands
    }

    /// Rounding mode
    pub fn rounding(&self) -> RoundingMode {
        self.rounding
    }

    /// Ceiling of the reduced-rate (first) band
    pub fn reduced_rate_ceiling(&self) -> Option<Decimal> {
        self.bands.first().and_then(|b| b.ceiling_bbl)
    }

    /// Tax for a quantity at a rate, rounded to whole cents
    pub fn tax_cents(&self, qty_bbl: Decimal, rate_cents_per_bbl: i64) -> Result<i64> {
        let raw = qty_bbl
            .checked_mul(Decimal::from(rate_cents_per_bbl))
            .ok_or_else(|| {
                Error::Calculation(format!("{} × {} overflows", qty_bbl, rate_cents_per_bbl))
            })?;

        raw.round_dp_with_strategy(0, self.rounding.strategy())
            .to_i64()
            .ok_or_else(|| Error::Calculation(format!("{} cents does not fit in i64", raw)))
    }
}

/// Default CBMA bands
pub(crate) fn default_bands() -> Vec<BandConfig> {
    vec![
        BandConfig {
            band_id: BandId::First60k,
            ceiling_bbl: Some(Decimal::from(60_000)),
            rate_cents_per_bbl: 350, // $3.50
        },
        BandConfig {
            band_id: BandId::SixtyKTo6m,
            ceiling_bbl: Some(Decimal::from(6_000_000)),
            rate_cents_per_bbl: 1600, // $16.00
        },
        BandConfig {
            band_id: BandId::Over6m,
            ceiling_bbl: None,
            rate_cents_per_bbl: 1800, // $18.00
        },
    ]
}

fn validate_bands(bands: &[BandConfig]) -> Result<()> {
    if bands.is_empty() {
        return Err(Error::Configuration("rate table has no bands".to_string()));
    }

    let mut seen = HashSet::new();
    let mut previous_ceiling = Decimal::ZERO;

    for (index, band) in bands.iter().enumerate() {
        let is_last = index + 1 == bands.len();

        if !seen.insert(band.band_id) {
            return Err(Error::Configuration(format!(
                "band {} listed more than once",
                band.band_id
            )));
        }

        if band.rate_cents_per_bbl < 0 {
            return Err(Error::Configuration(format!(
                "band {} has negative rate {}",
                band.band_id, band.rate_cents_per_bbl
            )));
        }

        match (band.ceiling_bbl, is_last) {
            (Some(ceiling), false) => {
                if ceiling <= previous_ceiling {
                    return Err(Error::Configuration(format!(
                        "band {} ceiling {} is not above {}",
                        band.band_id, ceiling, previous_ceiling
                    )));
                }
                previous_ceiling = ceiling;
            }
            (None, false) => {
                return Err(Error::Configuration(format!(
                    "band {} is unbounded but is not the last band",
                    band.band_id
                )));
            }
            (Some(_), true) => {
                return Err(Error::Configuration(format!(
                    "last band {} must be unbounded",
                    band.band_id
                )));
            }
            (None, true) => {}
        }
    }

    Ok(())
}
