//! Property-based tests for excise band allocation
//!
//! - Conservation: Σ(band qty) == taxable removals
//! - Monotonicity: more year-to-date usage never adds reduced-rate barrels
//! - Totals: Σ(band tax) == total tax

use excise_tax::{BandId, CbmaCounter, ExciseCalculator};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for barrel quantities with two decimal places
fn barrels_strategy(max_hundredths: i64) -> impl Strategy<Value = Decimal> {
    (0i64..max_hundredths).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Property: no barrels lost or duplicated across bands
    #[test]
    fn prop_allocation_conserves_barrels(
        taxable in barrels_strategy(1_000_000_000),
        ytd in barrels_strategy(6_000_001),
    ) {
        let allocation = ExciseCalculator::default().allocate(taxable, ytd).unwrap();

        prop_assert_eq!(allocation.allocated_bbl(), taxable);
        prop_assert_eq!(allocation.ytd_after_bbl, ytd + taxable);
        for band in &allocation.bands {
            prop_assert!(band.qty_bbl > Decimal::ZERO);
        }
    }

    /// Property: increasing year-to-date usage never increases the cheapest band
    #[test]
    fn prop_first_band_monotonic(
        taxable in barrels_strategy(20_000_000),
        ytd in barrels_strategy(6_000_001),
        extra in barrels_strategy(2_000_000),
    ) {
        let calculator = ExciseCalculator::default();
        let lower = calculator.allocate(taxable, ytd).unwrap();
        let higher = calculator.allocate(taxable, ytd + extra).unwrap();

        prop_assert!(higher.qty_in(BandId::First60k) <= lower.qty_in(BandId::First60k));
    }

    /// Property: total tax is the sum of band taxes
    #[test]
    fn prop_total_is_sum_of_bands(
        taxable in barrels_strategy(50_000_000),
        ytd in barrels_strategy(100_000_000),
    ) {
        let allocation = ExciseCalculator::default().allocate(taxable, ytd).unwrap();
        let sum: i64 = allocation.bands.iter().map(|b| b.tax_cents).sum();
        prop_assert_eq!(allocation.total_tax_cents, sum);
    }

    /// Property: bands are filled in ascending order
    #[test]
    fn prop_bands_ascending(
        taxable in barrels_strategy(1_000_000_000),
        ytd in barrels_strategy(700_000_000),
    ) {
        let allocation = ExciseCalculator::default().allocate(taxable, ytd).unwrap();
        let order = |id: BandId| match id {
            BandId::First60k => 0,
            BandId::SixtyKTo6m => 1,
            BandId::Over6m => 2,
        };
        for pair in allocation.bands.windows(2) {
            prop_assert!(order(pair[0].band_id) < order(pair[1].band_id));
        }
    }
}

#[test]
fn scenario_small_brewer_first_band() {
    let allocation = ExciseCalculator::default()
        .allocate(Decimal::new(45678, 2), Decimal::from(15_234))
        .unwrap();

    assert_eq!(allocation.qty_in(BandId::First60k), Decimal::new(45678, 2));
    assert_eq!(allocation.total_tax_cents, 159_873);
}

#[test]
fn scenario_spill_at_band_boundary() {
    let allocation = ExciseCalculator::default()
        .allocate(Decimal::from(500), Decimal::from(59_800))
        .unwrap();

    assert_eq!(allocation.qty_in(BandId::First60k), Decimal::from(200));
    assert_eq!(allocation.qty_in(BandId::SixtyKTo6m), Decimal::from(300));
}

#[test]
fn scenario_counter_drives_consecutive_periods() {
    let calculator = ExciseCalculator::default();
    let counter = CbmaCounter::default();

    let january = calculator
        .allocate(Decimal::from(40_000), counter.used(2025))
        .unwrap();
    counter.record(2025, january.taxable_bbl).unwrap();

    let february = calculator
        .allocate(Decimal::from(30_000), counter.used(2025))
        .unwrap();
    counter.record(2025, february.taxable_bbl).unwrap();

    assert_eq!(january.qty_in(BandId::First60k), Decimal::from(40_000));
    assert_eq!(february.qty_in(BandId::First60k), Decimal::from(20_000));
    assert_eq!(february.qty_in(BandId::SixtyKTo6m), Decimal::from(10_000));
    assert_eq!(counter.reduced_rate_used(2025), Decimal::from(60_000));

    // Next tax year starts fresh
    let next_january = calculator
        .allocate(Decimal::from(1_000), counter.used(2026))
        .unwrap();
    assert_eq!(next_january.qty_in(BandId::First60k), Decimal::from(1_000));
}
