//! Tax-band allocation

use crate::{
    bands::{BandId, RateTable},
    config::ExciseConfig,
    Error, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Barrels and tax allocated to one band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBand {
    /// Band identifier
    pub band_id: BandId,
    /// Rate applied (cents per barrel)
    pub rate_cents_per_bbl: i64,
    /// Barrels taxed in this band
    pub qty_bbl: Decimal,
    /// Tax in cents
    pub tax_cents: i64,
}

/// Result of allocating a period's taxable removals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Bands that received barrels, lowest first
    pub bands: Vec<RateBand>,
    /// Taxable removals allocated
    pub taxable_bbl: Decimal,
    /// Year-to-date barrels before this period
    pub ytd_before_bbl: Decimal,
    /// Year-to-date barrels after this period
    pub ytd_after_bbl: Decimal,
    /// Sum of band taxes
    pub total_tax_cents: i64,
}

impl Allocation {
    /// Barrels allocated to a band (zero if none)
    pub fn qty_in(&self, band_id: BandId) -> Decimal {
        self.bands
            .iter()
            .filter(|b| b.band_id == band_id)
            .map(|b| b.qty_bbl)
            .sum()
    }

    /// Sum of all band quantities
    pub fn allocated_bbl(&self) -> Decimal {
        self.bands.iter().map(|b| b.qty_bbl).sum()
    }
}

/// Excise tax-band calculator
#[derive(Debug, Clone)]
pub struct ExciseCalculator {
    table: RateTable,
}

impl Default for ExciseCalculator {
    fn default() -> Self {
        Self::new(RateTable::cbma_2025())
    }
}

impl ExciseCalculator {
    /// Create calculator over a validated table
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }

    /// Build from configuration (validates the table)
    pub fn from_config(config: &ExciseConfig) -> Result<Self> {
        Ok(Self::new(config.rate_table()?))
    }

    /// Rate table in use
    pub fn table(&self) -> &RateTable {
        &self.table
    }

    /// Allocate taxable removals across bands given year-to-date usage
    pub fn allocate(&self, taxable_bbl: Decimal, ytd_used_bbl: Decimal) -> Result<Allocation> {
        if taxable_bbl.is_sign_negative() && !taxable_bbl.is_zero() {
            return Err(Error::InvalidQuantity(format!(
                "taxable removals cannot be negative: {}",
                taxable_bbl
            )));
        }
        if ytd_used_bbl.is_sign_negative() && !ytd_used_bbl.is_zero() {
            return Err(Error::InvalidQuantity(format!(
                "year-to-date barrels cannot be negative: {}",
                ytd_used_bbl
            )));
        }

        let mut left = taxable_bbl;
        let mut cursor = ytd_used_bbl;
        let mut bands = Vec::new();
        let mut total_tax_cents: i64 = 0;

        for band in self.table.bands() {
            if left <= Decimal::ZERO {
                break;
            }

            // Already past this band's ceiling → zero capacity, move on
            let capacity = match band.ceiling_bbl {
                Some(ceiling) => (ceiling - cursor).max(Decimal::ZERO),
                None => left,
            };
            let qty = capacity.min(left);
            if qty <= Decimal::ZERO {
                continue;
            }

            let tax_cents = self.table.tax_cents(qty, band.rate_cents_per_bbl)?;
            total_tax_cents = total_tax_cents
                .checked_add(tax_cents)
                .ok_or_else(|| Error::Calculation("total tax overflows".to_string()))?;

            bands.push(RateBand {
                band_id: band.band_id,
                rate_cents_per_bbl: band.rate_cents_per_bbl,
                qty_bbl: qty,
                tax_cents,
            });

            left -= qty;
            cursor += qty;
        }

        if left > Decimal::ZERO {
            return Err(Error::Configuration(format!(
                "rate bands exhausted with {} bbl unallocated",
                left
            )));
        }

        tracing::debug!(
            taxable_bbl = %taxable_bbl,
            ytd_used_bbl = %ytd_used_bbl,
            bands = bands.len(),
            total_tax_cents,
            "Allocated excise bands"
        );

        Ok(Allocation {
            bands,
            taxable_bbl,
            ytd_before_bbl: ytd_used_bbl,
            ytd_after_bbl: ytd_used_bbl + taxable_bbl,
            total_tax_cents,
        })
    }
}
