//! Property-based tests for reconciliation invariants
//!
//! These tests use proptest to verify:
//! - Idempotency: reconciling the same ledger twice gives the same result
//! - Conservation: a ledger whose closing matches the equation is valid
//! - Aggregation: a closing count equal to the running balance always reconciles

use brop_ledger::{
    Aggregator, AnomalyKind, Category, InMemoryMovementLog, Movement, MovementLog, MovementSource,
    OpeningBalance, PeriodLedgerEntry, Reconciler, SourceKind, WorkspaceId,
};
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for barrel quantities with two decimal places
fn barrels_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

/// Strategy for movement categories (no balance lines)
fn movement_category_strategy() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Produced),
        Just(Category::ReceivedInBond),
        Just(Category::ReturnedToBrewery),
        Just(Category::RemovedTaxDetermined),
        Just(Category::RemovedWithoutTax),
        Just(Category::ConsumedOnPremises),
        Just(Category::Destroyed),
        Just(Category::Loss),
        Just(Category::Shortage),
    ]
}

fn movement_strategy() -> impl Strategy<Value = (Category, i64, u32)> {
    (movement_category_strategy(), 1i64..500_000i64, 1u32..=30u32)
}

fn ledger_entries(
    opening: Decimal,
    additions: [Decimal; 3],
    removals: [Decimal; 6],
) -> Vec<PeriodLedgerEntry> {
    let closing = opening + additions.iter().copied().sum::<Decimal>()
        - removals.iter().copied().sum::<Decimal>();

    let mut entries = vec![PeriodLedgerEntry::new(Category::Opening, opening)];
    for (category, qty) in [
        Category::Produced,
        Category::ReceivedInBond,
        Category::ReturnedToBrewery,
    ]
    .into_iter()
    .zip(additions)
    {
        entries.push(PeriodLedgerEntry::new(category, qty));
    }
    for (category, qty) in [
        Category::RemovedTaxDetermined,
        Category::RemovedWithoutTax,
        Category::ConsumedOnPremises,
        Category::Destroyed,
        Category::Loss,
        Category::Shortage,
    ]
    .into_iter()
    .zip(removals)
    {
        entries.push(PeriodLedgerEntry::new(category, qty));
    }
    entries.push(PeriodLedgerEntry::new(Category::Closing, closing));
    entries
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: reconcile is idempotent and does not touch its input
    #[test]
    fn prop_reconcile_idempotent(
        opening in barrels_strategy(),
        additions in prop::array::uniform3(barrels_strategy()),
        removals in prop::array::uniform6(barrels_strategy()),
        closing_skew in -500i64..500i64,
    ) {
        let mut entries = ledger_entries(opening, additions, removals);
        if let Some(closing) = entries.last_mut() {
            closing.quantity_bbl += Decimal::new(closing_skew, 2);
        }
        let before = entries.clone();

        let reconciler = Reconciler::default();
        let first = reconciler.reconcile_entries(&entries);
        let second = reconciler.reconcile_entries(&entries);

        prop_assert_eq!(first, second);
        prop_assert_eq!(entries, before);
    }

    /// Property: balanced ledgers are valid and carry no variance anomaly
    #[test]
    fn prop_balanced_ledger_valid(
        opening in barrels_strategy(),
        additions in prop::array::uniform3(barrels_strategy()),
        removals in prop::array::uniform6(barrels_strategy()),
        rounding in -1i64..=1i64,
    ) {
        let mut entries = ledger_entries(opening, additions, removals);
        if let Some(closing) = entries.last_mut() {
            closing.quantity_bbl += Decimal::new(rounding, 2);
        }

        let result = Reconciler::default().reconcile_entries(&entries);

        prop_assert!(result.is_valid);
        prop_assert_eq!(result.anomalies_of(AnomalyKind::Variance).count(), 0);
    }

    /// Property: counting exactly the running balance reconciles to zero variance
    #[test]
    fn prop_aggregated_count_reconciles(
        opening in 1_000_000i64..5_000_000i64,
        movements in prop::collection::vec(movement_strategy(), 0..50),
    ) {
        let workspace = WorkspaceId::new("brewery-prop");
        let log = InMemoryMovementLog::new();
        let opening_bbl = Decimal::new(opening, 2);
        let mut expected = opening_bbl;

        for (category, hundredths, day) in &movements {
            let movement = Movement::new(
                workspace.clone(),
                *category,
                Decimal::new(*hundredths, 2),
                NaiveDate::from_ymd_opt(2025, 6, *day).unwrap(),
                MovementSource::new(SourceKind::Adjustment, "prop"),
            );
            expected += movement.net_effect();
            log.record(movement).unwrap();
        }
        let mut recorded = movements.len();
        if !expected.is_zero() {
            log.record(Movement::new(
                workspace.clone(),
                Category::Closing,
                expected.abs(),
                NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
                MovementSource::new(SourceKind::InventoryCount, "count"),
            ))
            .unwrap();
            recorded += 1;
        }

        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        prop_assert_eq!(log.movements_in(&workspace, start, end).unwrap().len(), recorded);

        let ledger = Aggregator::new()
            .aggregate(&log, &workspace, start, end, &OpeningBalance::Initial(opening_bbl))
            .unwrap();
        let result = Reconciler::default().reconcile(&ledger);

        if expected >= Decimal::ZERO {
            prop_assert!(result.is_valid);
            prop_assert_eq!(result.variance_bbl, Decimal::ZERO);
        }
        prop_assert_eq!(result.calculated_closing_bbl, expected);
        if let Some(last) = ledger.checkpoints.last() {
            prop_assert_eq!(last.running_balance_bbl, expected);
        }
    }
}

#[test]
fn scenario_brop_worked_example() {
    let d = |cents: i64| Decimal::new(cents, 2);
    let entries = vec![
        PeriodLedgerEntry::new(Category::Opening, d(123456)),
        PeriodLedgerEntry::new(Category::Produced, d(89012)),
        PeriodLedgerEntry::new(Category::ReceivedInBond, d(0)),
        PeriodLedgerEntry::new(Category::ReturnedToBrewery, d(1234)),
        PeriodLedgerEntry::new(Category::RemovedTaxDetermined, d(45678)),
        PeriodLedgerEntry::new(Category::RemovedWithoutTax, d(0)),
        PeriodLedgerEntry::new(Category::ConsumedOnPremises, d(567)),
        PeriodLedgerEntry::new(Category::Destroyed, d(245)),
        PeriodLedgerEntry::new(Category::Loss, d(123)),
        PeriodLedgerEntry::new(Category::Closing, d(167089)),
    ];

    let result = Reconciler::default().reconcile_entries(&entries);

    assert_eq!(result.calculated_closing_bbl, d(167089));
    assert_eq!(result.variance_bbl, Decimal::ZERO);
    assert!(result.is_valid);
    assert!(result.anomalies.is_empty());
}
