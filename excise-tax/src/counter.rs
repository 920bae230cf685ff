//! CBMA year-to-date counter
//!
//! Cumulative taxable barrels per calendar (tax) year. A year that has not
//! been seen reads as zero, which is the January 1 reset. The counter is an
//! explicit value owned by the caller and shared by every period of the year.

use crate::{Error, RateTable, Result};
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Per-tax-year cumulative taxable barrels
#[derive(Debug)]
pub struct CbmaCounter {
    years: DashMap<i32, Decimal>,
    reduced_rate_ceiling: Decimal,
}

impl Default for CbmaCounter {
    fn default() -> Self {
        Self::from_table(&RateTable::cbma_2025())
    }
}

impl CbmaCounter {
    /// Create counter with the reduced-rate ceiling
    pub fn new(reduced_rate_ceiling: Decimal) -> Self {
        Self {
            years: DashMap::new(),
            reduced_rate_ceiling,
        }
    }

    /// Counter whose ceiling is the first band of a rate table
    pub fn from_table(table: &RateTable) -> Self {
        Self::new(table.reduced_rate_ceiling().unwrap_or(Decimal::ZERO))
    }

    /// Barrels per year eligible for the reduced rate
    pub fn reduced_rate_ceiling(&self) -> Decimal {
        self.reduced_rate_ceiling
    }

    /// Seed a year from an external source of record
    pub fn seed(&self, year: i32, used_bbl: Decimal) -> Result<()> {
        check_non_negative(used_bbl)?;
        self.years.insert(year, used_bbl);
        Ok(())
    }

    /// Taxable barrels recorded for the year
    pub fn used(&self, year: i32) -> Decimal {
        self.years.get(&year).map(|v| *v).unwrap_or(Decimal::ZERO)
    }

    /// Add taxable barrels to a year, returning the new total
    pub fn record(&self, year: i32, taxable_bbl: Decimal) -> Result<Decimal> {
        check_non_negative(taxable_bbl)?;
        let mut entry = self.years.entry(year).or_insert(Decimal::ZERO);
        *entry += taxable_bbl;
        let total = *entry;

        tracing::info!(year, taxable_bbl = %taxable_bbl, total_bbl = %total, "CBMA counter updated");
        Ok(total)
    }

    /// Barrels taxed at the reduced rate so far this year
    pub fn reduced_rate_used(&self, year: i32) -> Decimal {
        self.used(year).min(self.reduced_rate_ceiling)
    }

    /// Reduced-rate barrels still available this year
    pub fn reduced_rate_remaining(&self, year: i32) -> Decimal {
        self.reduced_rate_ceiling - self.reduced_rate_used(year)
    }
}

fn check_non_negative(bbl: Decimal) -> Result<()> {
    if bbl.is_sign_negative() && !bbl.is_zero() {
        return Err(Error::InvalidQuantity(format!(
            "counter cannot record negative barrels: {}",
            bbl
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_year_starts_at_zero() {
        let counter = CbmaCounter::default();
        counter.record(2024, Decimal::from(59_000)).unwrap();

        assert_eq!(counter.used(2024), Decimal::from(59_000));
        assert_eq!(counter.used(2025), Decimal::ZERO);
        assert_eq!(counter.reduced_rate_remaining(2025), Decimal::from(60_000));
    }

    #[test]
    fn test_reduced_rate_capped() {
        let counter = CbmaCounter::default();
        counter.seed(2025, Decimal::from(58_000)).unwrap();
        counter.record(2025, Decimal::from(5_000)).unwrap();

        assert_eq!(counter.used(2025), Decimal::from(63_000));
        assert_eq!(counter.reduced_rate_used(2025), Decimal::from(60_000));
        assert_eq!(counter.reduced_rate_remaining(2025), Decimal::ZERO);
    }

    #[test]
    fn test_ceiling_follows_rate_table() {
        let mut bands = RateTable::cbma_2025().bands().to_vec();
        bands[0].ceiling_bbl = Some(Decimal::from(50_000));
        let table = RateTable::new(bands, crate::RoundingMode::HalfUp).unwrap();

        let counter = CbmaCounter::from_table(&table);
        counter.record(2025, Decimal::from(55_000)).unwrap();

        assert_eq!(counter.reduced_rate_ceiling(), Decimal::from(50_000));
        assert_eq!(counter.reduced_rate_used(2025), Decimal::from(50_000));
        assert_eq!(
            CbmaCounter::default().reduced_rate_ceiling(),
            Decimal::from(60_000)
        );
    }

    #[test]
    fn test_negative_rejected() {
        let counter = CbmaCounter::default();
        assert!(counter.record(2025, Decimal::from(-5)).is_err());
        assert!(counter.seed(2025, Decimal::from(-5)).is_err());
    }

    #[test]
    fn test_concurrent_records() {
        let counter = Arc::new(CbmaCounter::default());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let counter = counter.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        counter.record(2025, Decimal::new(125, 2)).unwrap();
                    }
                });
            }
        });
        assert_eq!(counter.used(2025), Decimal::from(1_000));
    }
}
