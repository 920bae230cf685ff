//! Period ledger aggregation
//!
//! Sums the movement log into one entry per BROP line for a period.
//!
//! # Opening balance chain
//!
//! The opening balance of period N is the closing balance of period N−1.
//! Aggregation fails fast with [`Error::DataGap`] when that chain is broken,
//! so a gap is reported when a draft is generated rather than when someone
//! tries to finalize it.
//!
//! # Corrections
//!
//! A movement dated inside an already finalized period is never applied to
//! that period. It is carried into the first period aggregated after the
//! finalization instead.

use crate::{
    log::MovementLog,
    types::{Category, Direction, Movement, PeriodLedgerEntry, WorkspaceId},
    Error, Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Where the opening balance comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningBalance {
    /// Closing balance of the finalized prior period
    Chained {
        /// Prior period ID
        prior_period_id: Uuid,
        /// Last day of the prior period
        prior_end: NaiveDate,
        /// Reported closing of the prior period
        closing_bbl: Decimal,
        /// Log cutoff of the prior period's frozen ledger; later entries
        /// dated before this period are carried into it
        as_of: DateTime<Utc>,
    },
    /// Physical count for a brewery's first reporting period
    Initial(Decimal),
    /// No prior balance available
    Missing,
}

/// Running balance at the end of a day with movements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Business date
    pub date: NaiveDate,
    /// Balance after all movements of the day
    pub running_balance_bbl: Decimal,
}

/// Aggregated ledger for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodLedger {
    /// Workspace
    pub workspace: WorkspaceId,

    /// First day (inclusive)
    pub start: NaiveDate,

    /// Last day (inclusive)
    pub end: NaiveDate,

    /// One entry per category, in line-code order
    pub entries: Vec<PeriodLedgerEntry>,

    /// Daily running balances
    pub checkpoints: Vec<Checkpoint>,

    /// Closing balance of the prior finalized period, if chained
    pub prior_closing_bbl: Option<Decimal>,

    /// Opening count recorded in the log, if any
    pub reported_opening_bbl: Option<Decimal>,

    /// Whether a closing inventory count was recorded
    pub closing_counted: bool,

    /// Movements aggregated (including carried corrections)
    pub movement_count: usize,

    /// Production movements whose batch records are incomplete
    pub provisional_production: usize,

    /// Corrections carried forward from finalized periods
    pub carried_corrections: usize,

    /// Movements recorded after this instant are not part of the ledger
    pub as_of: DateTime<Utc>,
}

impl PeriodLedger {
    /// Build a ledger from bare entries (no chain or checkpoint context)
    pub fn from_entries(
        workspace: WorkspaceId,
        start: NaiveDate,
        end: NaiveDate,
        entries: Vec<PeriodLedgerEntry>,
    ) -> Self {
        let closing_counted = entries.iter().any(|e| e.category == Category::Closing);
        Self {
            workspace,
            start,
            end,
            entries,
            checkpoints: Vec::new(),
            prior_closing_bbl: None,
            reported_opening_bbl: None,
            closing_counted,
            movement_count: 0,
            provisional_production: 0,
            carried_corrections: 0,
            as_of: Utc::now(),
        }
    }

    /// Total for a category (zero if absent)
    pub fn quantity(&self, category: Category) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.quantity_bbl)
            .sum()
    }
}

/// Period ledger aggregator
#[derive(Debug, Default, Clone)]
pub struct Aggregator;

impl Aggregator {
    /// Create new aggregator
    pub fn new() -> Self {
        Self
    }

    /// Aggregate a workspace's movements for `[start, end]` as of now
    pub fn aggregate<L: MovementLog + ?Sized>(
        &self,
        log: &L,
        workspace: &WorkspaceId,
        start: NaiveDate,
        end: NaiveDate,
        opening: &OpeningBalance,
    ) -> Result<PeriodLedger> {
        self.aggregate_as_of(log, workspace, start, end, opening, Utc::now())
    }

    /// Aggregate using only movements recorded at or before `as_of`
    ///
    /// A movement recorded later, but dated in this period, is carried into
    /// the next period once this ledger is frozen, so every movement lands in
    /// exactly one ledger.
    pub fn aggregate_as_of<L: MovementLog + ?Sized>(
        &self,
        log: &L,
        workspace: &WorkspaceId,
        start: NaiveDate,
        end: NaiveDate,
        opening: &OpeningBalance,
        as_of: DateTime<Utc>,
    ) -> Result<PeriodLedger> {
        if start > end {
            return Err(Error::InvalidPeriod(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let movements: Vec<Movement> = log
            .movements_in(workspace, start, end)?
            .into_iter()
            .filter(|m| m.recorded_at <= as_of)
            .collect();

        let (opening_bbl, prior_closing_bbl, carried) = match opening {
            OpeningBalance::Chained {
                prior_period_id,
                prior_end,
                closing_bbl,
                as_of: prior_as_of,
            } => {
                if prior_end.succ_opt() != Some(start) {
                    return Err(Error::DataGap {
                        workspace: workspace.to_string(),
                        period_start: start,
                        detail: format!(
                            "prior period {} ends {}, not the day before",
                            prior_period_id, prior_end
                        ),
                    });
                }
                let carried: Vec<Movement> = log
                    .late_corrections(workspace, start, *prior_as_of)?
                    .into_iter()
                    .filter(|m| {
                        m.category.direction() != Direction::Balance && m.recorded_at <= as_of
                    })
                    .collect();
                (*closing_bbl, Some(*closing_bbl), carried)
            }
            OpeningBalance::Initial(count) => (*count, None, Vec::new()),
            OpeningBalance::Missing => {
                if !movements.is_empty() {
                    return Err(Error::DataGap {
                        workspace: workspace.to_string(),
                        period_start: start,
                        detail: format!(
                            "{} movements but no prior closing balance",
                            movements.len()
                        ),
                    });
                }
                (Decimal::ZERO, None, Vec::new())
            }
        };

        let mut totals: BTreeMap<Category, Decimal> = BTreeMap::new();
        let mut daily_net: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        let mut opening_count: Option<LatestCount> = None;
        let mut closing_count: Option<LatestCount> = None;
        let mut provisional_production = 0;

        // Carried corrections land on the first day of this period
        let dated = carried
            .iter()
            .map(|m| (start, m))
            .chain(movements.iter().map(|m| (m.occurred_on, m)));

        for (date, movement) in dated {
            // Counts are balances: the latest one stands, they never add up
            match movement.category {
                Category::Opening => {
                    LatestCount::observe(&mut opening_count, movement);
                    continue;
                }
                Category::Closing => {
                    LatestCount::observe(&mut closing_count, movement);
                    continue;
                }
                Category::Produced if movement.provisional => provisional_production += 1,
                _ => {}
            }

            *totals.entry(movement.category).or_insert(Decimal::ZERO) += movement.quantity_bbl;
            *daily_net.entry(date).or_insert(Decimal::ZERO) += movement.net_effect();
        }

        let reported_opening_bbl = opening_count.map(|c| c.quantity_bbl);
        let closing_counted = closing_count.is_some();
        if let Some(count) = closing_count {
            totals.insert(Category::Closing, count.quantity_bbl);
        }

        let mut running = opening_bbl;
        let checkpoints = daily_net
            .into_iter()
            .map(|(date, net)| {
                running += net;
                Checkpoint {
                    date,
                    running_balance_bbl: running,
                }
            })
            .collect();

        let entries = Category::ALL
            .iter()
            .map(|category| {
                let quantity = match category {
                    Category::Opening => opening_bbl,
                    other => totals.get(other).copied().unwrap_or(Decimal::ZERO),
                };
                let mut entry = PeriodLedgerEntry::new(*category, quantity);
                if *category == Category::Opening {
                    entry.notes = Some(opening_note(opening));
                }
                entry
            })
            .collect();

        tracing::debug!(
            workspace = %workspace,
            %start,
            %end,
            movements = movements.len(),
            carried = carried.len(),
            "Aggregated period ledger"
        );

        Ok(PeriodLedger {
            workspace: workspace.clone(),
            start,
            end,
            entries,
            checkpoints,
            prior_closing_bbl,
            reported_opening_bbl,
            closing_counted,
            movement_count: movements.len() + carried.len(),
            provisional_production,
            carried_corrections: carried.len(),
            as_of,
        })
    }
}

/// Most recent physical count of a balance line
#[derive(Clone, Copy)]
struct LatestCount {
    occurred_on: NaiveDate,
    recorded_at: DateTime<Utc>,
    quantity_bbl: Decimal,
}

impl LatestCount {
    fn observe(slot: &mut Option<LatestCount>, movement: &Movement) {
        let candidate = LatestCount {
            occurred_on: movement.occurred_on,
            recorded_at: movement.recorded_at,
            quantity_bbl: movement.quantity_bbl,
        };
        let newer = match slot {
            Some(current) => {
                (candidate.occurred_on, candidate.recorded_at)
                    >= (current.occurred_on, current.recorded_at)
            }
            None => true,
        };
        if newer {
            *slot = Some(candidate);
        }
    }
}

fn opening_note(opening: &OpeningBalance) -> String {
    match opening {
        OpeningBalance::Chained { prior_period_id, .. } => {
            format!("Chained from period {}", prior_period_id)
        }
        OpeningBalance::Initial(_) => "Initial inventory count".to_string(),
        OpeningBalance::Missing => "No prior balance".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::InMemoryMovementLog;
    use crate::types::{MovementSource, SourceKind};
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ws() -> WorkspaceId {
        WorkspaceId::new("brewery-1")
    }

    fn record(log: &InMemoryMovementLog, category: Category, qty: i64, on: NaiveDate) {
        log.record(Movement::new(
            ws(),
            category,
            Decimal::new(qty, 2),
            on,
            MovementSource::new(SourceKind::Adjustment, "T-1"),
        ))
        .unwrap();
    }

    #[test]
    fn test_sums_per_category() {
        let log = InMemoryMovementLog::new();
        record(&log, Category::Produced, 10000, date(2025, 3, 3));
        record(&log, Category::Produced, 5050, date(2025, 3, 10));
        record(&log, Category::RemovedTaxDetermined, 4000, date(2025, 3, 12));
        record(&log, Category::Closing, 21050, date(2025, 3, 31));

        let ledger = Aggregator::new()
            .aggregate(
                &log,
                &ws(),
                date(2025, 3, 1),
                date(2025, 3, 31),
                &OpeningBalance::Initial(Decimal::new(10000, 2)),
            )
            .unwrap();

        assert_eq!(ledger.entries.len(), 11);
        assert_eq!(ledger.quantity(Category::Opening), Decimal::new(10000, 2));
        assert_eq!(ledger.quantity(Category::Produced), Decimal::new(15050, 2));
        assert_eq!(ledger.quantity(Category::RemovedTaxDetermined), Decimal::new(4000, 2));
        assert_eq!(ledger.quantity(Category::Closing), Decimal::new(21050, 2));
        assert!(ledger.closing_counted);

        let balances: Vec<Decimal> = ledger.checkpoints.iter().map(|c| c.running_balance_bbl).collect();
        assert_eq!(
            balances,
            vec![Decimal::new(20000, 2), Decimal::new(25050, 2), Decimal::new(21050, 2)]
        );
    }

    #[test]
    fn test_missing_opening_with_movements_is_data_gap() {
        let log = InMemoryMovementLog::new();
        record(&log, Category::Produced, 10000, date(2025, 3, 3));

        let result = Aggregator::new().aggregate(
            &log,
            &ws(),
            date(2025, 3, 1),
            date(2025, 3, 31),
            &OpeningBalance::Missing,
        );
        assert!(matches!(result, Err(Error::DataGap { .. })));
    }

    #[test]
    fn test_missing_opening_without_movements_is_empty() {
        let log = InMemoryMovementLog::new();
        let ledger = Aggregator::new()
            .aggregate(&log, &ws(), date(2025, 3, 1), date(2025, 3, 31), &OpeningBalance::Missing)
            .unwrap();
        assert_eq!(ledger.quantity(Category::Opening), Decimal::ZERO);
        assert_eq!(ledger.movement_count, 0);
        assert!(ledger.checkpoints.is_empty());
    }

    #[test]
    fn test_chain_must_be_contiguous() {
        let log = InMemoryMovementLog::new();
        let opening = OpeningBalance::Chained {
            prior_period_id: Uuid::new_v4(),
            prior_end: date(2025, 1, 31),
            closing_bbl: Decimal::new(50000, 2),
            as_of: Utc::now(),
        };

        let result =
            Aggregator::new().aggregate(&log, &ws(), date(2025, 3, 1), date(2025, 3, 31), &opening);
        assert!(matches!(result, Err(Error::DataGap { .. })));
    }

    #[test]
    fn test_late_corrections_carried_forward() {
        let log = InMemoryMovementLog::new();
        let prior_as_of = Utc::now() - Duration::hours(1);

        // Entered after February was frozen, dated in February
        record(&log, Category::Loss, 300, date(2025, 2, 20));
        record(&log, Category::Produced, 10000, date(2025, 3, 5));

        let opening = OpeningBalance::Chained {
            prior_period_id: Uuid::new_v4(),
            prior_end: date(2025, 2, 28),
            closing_bbl: Decimal::new(50000, 2),
            as_of: prior_as_of,
        };

        let ledger = Aggregator::new()
            .aggregate(&log, &ws(), date(2025, 3, 1), date(2025, 3, 31), &opening)
            .unwrap();

        assert_eq!(ledger.carried_corrections, 1);
        assert_eq!(ledger.quantity(Category::Loss), Decimal::new(300, 2));
        assert_eq!(ledger.prior_closing_bbl, Some(Decimal::new(50000, 2)));
        assert_eq!(ledger.checkpoints[0].date, date(2025, 3, 1));
        assert_eq!(ledger.checkpoints[0].running_balance_bbl, Decimal::new(49700, 2));
    }

    #[test]
    fn test_opening_count_reported_separately() {
        let log = InMemoryMovementLog::new();
        record(&log, Category::Opening, 49900, date(2025, 3, 1));
        let opening = OpeningBalance::Chained {
            prior_period_id: Uuid::new_v4(),
            prior_end: date(2025, 2, 28),
            closing_bbl: Decimal::new(50000, 2),
            as_of: Utc::now() + Duration::days(1),
        };

        let ledger = Aggregator::new()
            .aggregate(&log, &ws(), date(2025, 3, 1), date(2025, 3, 31), &opening)
            .unwrap();

        assert_eq!(ledger.quantity(Category::Opening), Decimal::new(50000, 2));
        assert_eq!(ledger.reported_opening_bbl, Some(Decimal::new(49900, 2)));
    }

    #[test]
    fn test_latest_count_stands() {
        let log = InMemoryMovementLog::new();
        record(&log, Category::Closing, 100000, date(2025, 1, 15));
        record(&log, Category::Produced, 5000, date(2025, 1, 20));
        record(&log, Category::Closing, 105000, date(2025, 1, 31));
        let recount = Utc::now();
        for (qty, recorded_at) in [(100000, recount), (99000, recount - Duration::hours(3))] {
            log.record(
                Movement::new(
                    ws(),
                    Category::Opening,
                    Decimal::new(qty, 2),
                    date(2025, 1, 1),
                    MovementSource::new(SourceKind::InventoryCount, "count"),
                )
                .recorded_at(recorded_at),
            )
            .unwrap();
        }

        let ledger = Aggregator::new()
            .aggregate(
                &log,
                &ws(),
                date(2025, 1, 1),
                date(2025, 1, 31),
                &OpeningBalance::Initial(Decimal::new(100000, 2)),
            )
            .unwrap();

        assert_eq!(ledger.quantity(Category::Closing), Decimal::new(105000, 2));
        assert_eq!(ledger.reported_opening_bbl, Some(Decimal::new(100000, 2)));
        assert!(ledger.closing_counted);

        let result = crate::Reconciler::default().reconcile(&ledger);
        assert!(result.is_valid);
        assert_eq!(result.variance_bbl, Decimal::ZERO);
    }

    #[test]
    fn test_movements_after_cutoff_excluded() {
        let log = InMemoryMovementLog::new();
        let cutoff = Utc::now() - Duration::minutes(10);
        log.record(
            Movement::new(
                ws(),
                Category::Produced,
                Decimal::new(1000, 2),
                date(2025, 3, 2),
                MovementSource::new(SourceKind::Batch, "B-1"),
            )
            .recorded_at(cutoff - Duration::minutes(1)),
        )
        .unwrap();
        record(&log, Category::Produced, 2000, date(2025, 3, 3));

        let ledger = Aggregator::new()
            .aggregate_as_of(
                &log,
                &ws(),
                date(2025, 3, 1),
                date(2025, 3, 31),
                &OpeningBalance::Initial(Decimal::ZERO),
                cutoff,
            )
            .unwrap();

        assert_eq!(ledger.as_of, cutoff);
        assert_eq!(ledger.movement_count, 1);
        assert_eq!(ledger.quantity(Category::Produced), Decimal::new(1000, 2));
    }

    #[test]
    fn test_provisional_production_counted() {
        let log = InMemoryMovementLog::new();
        log.record(
            Movement::new(
                ws(),
                Category::Produced,
                Decimal::new(3000, 2),
                date(2025, 3, 4),
                MovementSource::new(SourceKind::Batch, "B-7"),
            )
            .provisional(),
        )
        .unwrap();

        let ledger = Aggregator::new()
            .aggregate(
                &log,
                &ws(),
                date(2025, 3, 1),
                date(2025, 3, 31),
                &OpeningBalance::Initial(Decimal::ZERO),
            )
            .unwrap();
        assert_eq!(ledger.provisional_production, 1);
    }
}
