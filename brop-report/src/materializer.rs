//! Snapshot materialization
//!
//! Freezes a draft into a [`PeriodSnapshot`]: the period, its ledger lines,
//! the reconciliation and the band allocation, stamped with who finalized it
//! and when, and sealed with a SHA-256 hash over the bincode encoding.

use crate::{Error, Result};
use brop_ledger::{
    Checkpoint, OpeningBalance, Period, PeriodLedger, PeriodLedgerEntry, PeriodStatus,
    ReconciliationResult,
};
use chrono::{DateTime, Utc};
use excise_tax::Allocation;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Immutable record of a finalized period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    /// Unique snapshot ID
    pub snapshot_id: Uuid,

    /// Period, in finalized status
    pub period: Period,

    /// Where the opening balance came from
    pub opening: OpeningBalance,

    /// One entry per TTB line
    pub entries: Vec<PeriodLedgerEntry>,

    /// End-of-day running balances
    pub checkpoints: Vec<Checkpoint>,

    /// Recording cutoff of the ledger; later movements carry into the next period
    pub as_of: DateTime<Utc>,

    /// Reconciliation at finalization
    pub reconciliation: ReconciliationResult,

    /// Excise allocation at finalization
    pub allocation: Allocation,

    /// Freeze timestamp
    pub finalized_at: DateTime<Utc>,

    /// Who finalized
    pub finalized_by: String,

    /// Whether anomalies were explicitly accepted
    pub acknowledged_anomalies: bool,

    /// SHA-256 over everything above
    pub content_hash: [u8; 32],
}

#[derive(Serialize)]
struct SealedContent<'a> {
    snapshot_id: &'a Uuid,
    period: &'a Period,
    opening: &'a OpeningBalance,
    entries: &'a [PeriodLedgerEntry],
    checkpoints: &'a [Checkpoint],
    as_of: &'a DateTime<Utc>,
    reconciliation: &'a ReconciliationResult,
    allocation: &'a Allocation,
    finalized_at: &'a DateTime<Utc>,
    finalized_by: &'a str,
    acknowledged_anomalies: bool,
}

impl PeriodSnapshot {
    /// Reported closing, which becomes the next period's opening
    pub fn closing_bbl(&self) -> Decimal {
        self.reconciliation.closing_bbl
    }

    /// Compute the content hash
    pub fn compute_hash(&self) -> Result<[u8; 32]> {
        let content = SealedContent {
            snapshot_id: &self.snapshot_id,
            period: &self.period,
            opening: &self.opening,
            entries: &self.entries,
            checkpoints: &self.checkpoints,
            as_of: &self.as_of,
            reconciliation: &self.reconciliation,
            allocation: &self.allocation,
            finalized_at: &self.finalized_at,
            finalized_by: &self.finalized_by,
            acknowledged_anomalies: self.acknowledged_anomalies,
        };
        let bytes = bincode::serialize(&content)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hasher.finalize().into())
    }

    /// Check the content against the recorded hash
    pub fn verify(&self) -> Result<()> {
        if self.compute_hash()? != self.content_hash {
            return Err(Error::Integrity(self.period.period_id));
        }
        Ok(())
    }

    /// Content hash as lowercase hex
    pub fn hash_hex(&self) -> String {
        self.content_hash
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Builds sealed snapshots from drafts
#[derive(Debug, Default, Clone)]
pub struct Materializer;

impl Materializer {
    /// Create new materializer
    pub fn new() -> Self {
        Self
    }

    /// Freeze a drafted period at the current time
    #[allow(clippy::too_many_arguments)]
    pub fn finalize(
        &self,
        period: &Period,
        ledger: &PeriodLedger,
        opening: &OpeningBalance,
        reconciliation: &ReconciliationResult,
        allocation: &Allocation,
        actor: &str,
        acknowledged_anomalies: bool,
    ) -> Result<PeriodSnapshot> {
        self.finalize_at(
            period,
            ledger,
            opening,
            reconciliation,
            allocation,
            actor,
            acknowledged_anomalies,
            Utc::now(),
        )
    }

    /// Freeze a drafted period with an explicit timestamp
    #[allow(clippy::too_many_arguments)]
    pub fn finalize_at(
        &self,
        period: &Period,
        ledger: &PeriodLedger,
        opening: &OpeningBalance,
        reconciliation: &ReconciliationResult,
        allocation: &Allocation,
        actor: &str,
        acknowledged_anomalies: bool,
        finalized_at: DateTime<Utc>,
    ) -> Result<PeriodSnapshot> {
        if ledger.workspace != period.workspace
            || ledger.start != period.start
            || ledger.end != period.end
        {
            return Err(Error::Inconsistent(format!(
                "ledger {} {}..{} does not cover period {} {}..{}",
                ledger.workspace,
                ledger.start,
                ledger.end,
                period.workspace,
                period.start,
                period.end
            )));
        }
        if allocation.taxable_bbl != reconciliation.removed_tax_bbl.max(Decimal::ZERO) {
            return Err(Error::Inconsistent(format!(
                "allocation covers {} bbl but {} bbl were removed tax-determined",
                allocation.taxable_bbl, reconciliation.removed_tax_bbl
            )));
        }
        if actor.trim().is_empty() {
            return Err(Error::Inconsistent("finalizing actor is required".to_string()));
        }

        let mut frozen = period.clone();
        frozen.transition(PeriodStatus::Finalized)?;

        let mut snapshot = PeriodSnapshot {
            snapshot_id: Uuid::new_v4(),
            period: frozen,
            opening: opening.clone(),
            entries: ledger.entries.clone(),
            checkpoints: ledger.checkpoints.clone(),
            as_of: ledger.as_of,
            reconciliation: reconciliation.clone(),
            allocation: allocation.clone(),
            finalized_at,
            finalized_by: actor.to_string(),
            acknowledged_anomalies,
            content_hash: [0u8; 32],
        };
        snapshot.content_hash = snapshot.compute_hash()?;

        tracing::debug!(
            period_id = %snapshot.period.period_id,
            hash = %snapshot.hash_hex(),
            "Materialized period snapshot"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brop_ledger::{Category, DueDateConfig, PeriodType, Reconciler, WorkspaceId};
    use chrono::NaiveDate;
    use excise_tax::ExciseCalculator;

    fn drafted_period() -> Period {
        let mut period = Period::new(
            WorkspaceId::new("brewery-1"),
            PeriodType::Monthly,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            &DueDateConfig::default(),
        )
        .unwrap();
        period.transition(PeriodStatus::Draft).unwrap();
        period
    }

    fn ledger_for(period: &Period) -> PeriodLedger {
        let d = |cents: i64| Decimal::new(cents, 2);
        PeriodLedger::from_entries(
            period.workspace.clone(),
            period.start,
            period.end,
            vec![
                PeriodLedgerEntry::new(Category::Opening, d(100000)),
                PeriodLedgerEntry::new(Category::Produced, d(50000)),
                PeriodLedgerEntry::new(Category::RemovedTaxDetermined, d(30000)),
                PeriodLedgerEntry::new(Category::Closing, d(120000)),
            ],
        )
    }

    fn materialize(period: &Period) -> Result<PeriodSnapshot> {
        let ledger = ledger_for(period);
        let reconciliation = Reconciler::default().reconcile(&ledger);
        let allocation = ExciseCalculator::default()
            .allocate(reconciliation.removed_tax_bbl, Decimal::ZERO)
            .unwrap();
        Materializer::new().finalize(
            period,
            &ledger,
            &OpeningBalance::Initial(Decimal::from(1000)),
            &reconciliation,
            &allocation,
            "auditor@brewery",
            false,
        )
    }

    #[test]
    fn test_snapshot_is_sealed() {
        let snapshot = materialize(&drafted_period()).unwrap();

        assert_eq!(snapshot.period.status, PeriodStatus::Finalized);
        assert_eq!(snapshot.closing_bbl(), Decimal::from(1200));
        assert_eq!(snapshot.allocation.total_tax_cents, 300 * 350);
        assert_eq!(snapshot.hash_hex().len(), 64);
        assert!(snapshot.verify().is_ok());
    }

    #[test]
    fn test_snapshot_keeps_ledger_cutoff() {
        let period = drafted_period();
        let mut ledger = ledger_for(&period);
        ledger.as_of = Utc::now() - chrono::Duration::hours(2);
        let reconciliation = Reconciler::default().reconcile(&ledger);
        let allocation = ExciseCalculator::default()
            .allocate(reconciliation.removed_tax_bbl, Decimal::ZERO)
            .unwrap();

        let mut snapshot = Materializer::new()
            .finalize(
                &period,
                &ledger,
                &OpeningBalance::Missing,
                &reconciliation,
                &allocation,
                "auditor@brewery",
                false,
            )
            .unwrap();

        assert_eq!(snapshot.as_of, ledger.as_of);
        assert!(snapshot.as_of < snapshot.finalized_at);

        snapshot.as_of = snapshot.finalized_at;
        assert!(matches!(snapshot.verify(), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_tampering_detected() {
        let mut snapshot = materialize(&drafted_period()).unwrap();
        snapshot.allocation.total_tax_cents += 1;
        assert!(matches!(snapshot.verify(), Err(Error::Integrity(_))));
    }

    #[test]
    fn test_finalized_period_rejected() {
        let mut period = drafted_period();
        period.transition(PeriodStatus::Finalized).unwrap();
        assert!(matches!(materialize(&period), Err(Error::AlreadyFinalized(_))));
    }

    #[test]
    fn test_ledger_must_cover_period() {
        let period = drafted_period();
        let mut ledger = ledger_for(&period);
        ledger.end = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let reconciliation = Reconciler::default().reconcile(&ledger);
        let allocation = ExciseCalculator::default()
            .allocate(reconciliation.removed_tax_bbl, Decimal::ZERO)
            .unwrap();

        let result = Materializer::new().finalize(
            &period,
            &ledger,
            &OpeningBalance::Missing,
            &reconciliation,
            &allocation,
            "auditor@brewery",
            false,
        );
        assert!(matches!(result, Err(Error::Inconsistent(_))));
    }
}
