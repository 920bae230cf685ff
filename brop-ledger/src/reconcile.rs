//! BROP reconciliation engine
//!
//! Applies the conservation equation to an aggregated period ledger:
//!
//! ```text
//! calculated_closing = opening + produced + received_in_bond + returned
//!                    − removed_tax_determined − removed_without_tax
//!                    − consumed_on_premises − destroyed − losses
//! variance           = calculated_closing − reported_closing
//! ```
//!
//! The ledger is valid when `|variance| ≤ tolerance`. Everything else the
//! engine notices is reported as an [`Anomaly`]; anomalies never fail the
//! computation; the caller decides whether to warn or block.
//!
//! Reconciliation is a pure function of its input.

use crate::{
    aggregator::{Checkpoint, PeriodLedger},
    config::ReconcileConfig,
    types::{Category, Direction, PeriodLedgerEntry},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only
    Info,
    /// Needs review before filing
    Warning,
    /// Report does not balance
    Error,
}

impl Severity {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// What was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Calculated and reported closing differ beyond tolerance
    Variance,
    /// Running balance dropped below zero inside the period
    NegativeRunningBalance,
    /// Opening count disagrees with the prior finalized closing
    OpeningMismatch,
    /// Negative total on a line that cannot be negative
    NegativeQuantity,
    /// Production records still incomplete
    IncompleteProduction,
    /// No closing inventory count recorded
    MissingClosingCount,
    /// Corrections to finalized periods pulled into this one
    CarriedCorrections,
}

/// Non-fatal finding attached to a reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Kind
    pub kind: AnomalyKind,
    /// Human-readable description
    pub message: String,
    /// Severity
    pub severity: Severity,
}

impl Anomaly {
    fn new(kind: AnomalyKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
        }
    }
}

/// Reconciliation outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// On hand beginning of period
    pub opening_bbl: Decimal,
    /// Produced by fermentation
    pub produced_bbl: Decimal,
    /// Received in bond
    pub received_bbl: Decimal,
    /// Returned to brewery
    pub returned_bbl: Decimal,
    /// Removed tax determined
    pub removed_tax_bbl: Decimal,
    /// Removed without payment of tax
    pub removed_notax_bbl: Decimal,
    /// Consumed on premises
    pub consumed_bbl: Decimal,
    /// Destroyed
    pub destroyed_bbl: Decimal,
    /// Losses plus shortage
    pub losses_bbl: Decimal,
    /// Reported closing (physical count)
    pub closing_bbl: Decimal,
    /// Closing derived from the equation
    pub calculated_closing_bbl: Decimal,
    /// calculated − reported
    pub variance_bbl: Decimal,
    /// Tolerance applied
    pub tolerance_bbl: Decimal,
    /// `|variance| ≤ tolerance`
    pub is_valid: bool,
    /// Findings
    pub anomalies: Vec<Anomaly>,
}

impl ReconciliationResult {
    /// Anomalies of a given kind
    pub fn anomalies_of(&self, kind: AnomalyKind) -> impl Iterator<Item = &Anomaly> {
        self.anomalies.iter().filter(move |a| a.kind == kind)
    }

    /// Anything at warning level or above
    pub fn needs_review(&self) -> bool {
        !self.is_valid || self.anomalies.iter().any(|a| a.severity >= Severity::Warning)
    }
}

/// What reconciliation reads from a ledger
struct LedgerFacts<'a> {
    entries: &'a [PeriodLedgerEntry],
    checkpoints: &'a [Checkpoint],
    prior_closing_bbl: Option<Decimal>,
    reported_opening_bbl: Option<Decimal>,
    closing_counted: bool,
    movement_count: usize,
    provisional_production: usize,
    carried_corrections: usize,
}

impl LedgerFacts<'_> {
    fn quantity(&self, category: Category) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.quantity_bbl)
            .sum()
    }
}

/// Reconciliation engine
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create new reconciler
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Tolerance in barrels
    pub fn tolerance(&self) -> Decimal {
        self.config.tolerance_bbl
    }

    /// Reconcile bare entries (no checkpoint or chain context)
    pub fn reconcile_entries(&self, entries: &[PeriodLedgerEntry]) -> ReconciliationResult {
        self.evaluate(&LedgerFacts {
            entries,
            checkpoints: &[],
            prior_closing_bbl: None,
            reported_opening_bbl: None,
            closing_counted: entries.iter().any(|e| e.category == Category::Closing),
            movement_count: 0,
            provisional_production: 0,
            carried_corrections: 0,
        })
    }

    /// Reconcile an aggregated period ledger
    pub fn reconcile(&self, ledger: &PeriodLedger) -> ReconciliationResult {
        self.evaluate(&LedgerFacts {
            entries: &ledger.entries,
            checkpoints: &ledger.checkpoints,
            prior_closing_bbl: ledger.prior_closing_bbl,
            reported_opening_bbl: ledger.reported_opening_bbl,
            closing_counted: ledger.closing_counted,
            movement_count: ledger.movement_count,
            provisional_production: ledger.provisional_production,
            carried_corrections: ledger.carried_corrections,
        })
    }

    fn evaluate(&self, ledger: &LedgerFacts<'_>) -> ReconciliationResult {
        let tolerance = self.config.tolerance_bbl;

        let opening = ledger.quantity(Category::Opening);
        let produced = ledger.quantity(Category::Produced);
        let received = ledger.quantity(Category::ReceivedInBond);
        let returned = ledger.quantity(Category::ReturnedToBrewery);
        let removed_tax = ledger.quantity(Category::RemovedTaxDetermined);
        let removed_notax = ledger.quantity(Category::RemovedWithoutTax);
        let consumed = ledger.quantity(Category::ConsumedOnPremises);
        let destroyed = ledger.quantity(Category::Destroyed);
        let losses = ledger.quantity(Category::Loss) + ledger.quantity(Category::Shortage);
        let closing = ledger.quantity(Category::Closing);

        let calculated_closing = opening + produced + received + returned
            - removed_tax
            - removed_notax
            - consumed
            - destroyed
            - losses;
        let variance = calculated_closing - closing;
        let is_valid = variance.abs() <= tolerance;

        let mut anomalies = Vec::new();

        if !is_valid {
            anomalies.push(Anomaly::new(
                AnomalyKind::Variance,
                Severity::Error,
                format!(
                    "Calculated closing {} differs from reported closing {} by {} bbl (tolerance {})",
                    calculated_closing, closing, variance, tolerance
                ),
            ));
        }

        for checkpoint in ledger.checkpoints {
            if checkpoint.running_balance_bbl.is_sign_negative()
                && !checkpoint.running_balance_bbl.is_zero()
            {
                anomalies.push(Anomaly::new(
                    AnomalyKind::NegativeRunningBalance,
                    Severity::Error,
                    format!(
                        "Running balance {} bbl on {}",
                        checkpoint.running_balance_bbl, checkpoint.date
                    ),
                ));
            }
        }

        if let (Some(reported), Some(prior)) = (ledger.reported_opening_bbl, ledger.prior_closing_bbl)
        {
            if (reported - prior).abs() > tolerance {
                anomalies.push(Anomaly::new(
                    AnomalyKind::OpeningMismatch,
                    Severity::Warning,
                    format!(
                        "Opening count {} bbl does not match prior period closing {} bbl",
                        reported, prior
                    ),
                ));
            }
        }

        for entry in ledger.entries {
            let category = entry.category;
            if category.direction() != Direction::Balance
                && !category.allows_negative()
                && entry.quantity_bbl.is_sign_negative()
                && !entry.quantity_bbl.is_zero()
            {
                anomalies.push(Anomaly::new(
                    AnomalyKind::NegativeQuantity,
                    Severity::Warning,
                    format!(
                        "Line {} ({}) is negative: {} bbl",
                        entry.line_code, category, entry.quantity_bbl
                    ),
                ));
            }
        }

        if ledger.provisional_production > 0 {
            anomalies.push(Anomaly::new(
                AnomalyKind::IncompleteProduction,
                Severity::Warning,
                format!(
                    "{} production records are still incomplete",
                    ledger.provisional_production
                ),
            ));
        }

        if !ledger.closing_counted && (ledger.movement_count > 0 || !opening.is_zero()) {
            anomalies.push(Anomaly::new(
                AnomalyKind::MissingClosingCount,
                Severity::Warning,
                "No closing inventory count recorded",
            ));
        }

        if ledger.carried_corrections > 0 {
            anomalies.push(Anomaly::new(
                AnomalyKind::CarriedCorrections,
                Severity::Info,
                format!(
                    "{} corrections to finalized periods carried into this period",
                    ledger.carried_corrections
                ),
            ));
        }

        ReconciliationResult {
            opening_bbl: opening,
            produced_bbl: produced,
            received_bbl: received,
            returned_bbl: returned,
            removed_tax_bbl: removed_tax,
            removed_notax_bbl: removed_notax,
            consumed_bbl: consumed,
            destroyed_bbl: destroyed,
            losses_bbl: losses,
            closing_bbl: closing,
            calculated_closing_bbl: calculated_closing,
            variance_bbl: variance,
            tolerance_bbl: tolerance,
            is_valid,
            anomalies,
        }
    }
}
