//! Reporting service
//!
//! Ties the movement log, the period store and the CBMA counter together.
//! Every draft is recomputed from the log; a finalized period is only ever
//! read back from its snapshot.

use crate::{
    config::Config,
    materializer::{Materializer, PeriodSnapshot},
    metrics::Metrics,
    store::{DraftReport, PeriodStore},
    Error, Result,
};
use brop_ledger::{
    Aggregator, MovementLog, OpeningBalance, Period, PeriodSchedule, PeriodType, Reconciler,
    WorkspaceId,
};
use chrono::{NaiveDate, Utc};
use excise_tax::{CbmaCounter, ExciseCalculator};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Finalization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    /// Draft revision the caller reviewed
    pub revision: u64,

    /// Who is finalizing
    pub actor: String,

    /// Accept a draft that has anomalies or does not balance
    #[serde(default)]
    pub acknowledge_anomalies: bool,
}

impl FinalizeRequest {
    /// Request for a reviewed revision
    pub fn new(revision: u64, actor: impl Into<String>) -> Self {
        Self {
            revision,
            actor: actor.into(),
            acknowledge_anomalies: false,
        }
    }

    /// Accept anomalies on the draft
    pub fn acknowledging_anomalies(mut self) -> Self {
        self.acknowledge_anomalies = true;
        self
    }
}

/// Current report for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeriodReport {
    /// Latest generated draft
    Draft(DraftReport),
    /// Frozen snapshot
    Finalized(PeriodSnapshot),
}

impl PeriodReport {
    /// Reported closing balance
    pub fn closing_bbl(&self) -> Decimal {
        match self {
            PeriodReport::Draft(draft) => draft.reconciliation.closing_bbl,
            PeriodReport::Finalized(snapshot) => snapshot.closing_bbl(),
        }
    }

    /// Total excise tax in cents
    pub fn total_tax_cents(&self) -> i64 {
        match self {
            PeriodReport::Draft(draft) => draft.allocation.total_tax_cents,
            PeriodReport::Finalized(snapshot) => snapshot.allocation.total_tax_cents,
        }
    }
}

/// BROP reporting service
pub struct ReportService {
    config: Config,
    store: Arc<dyn PeriodStore>,
    movements: Arc<dyn MovementLog>,
    counter: Arc<CbmaCounter>,
    aggregator: Aggregator,
    reconciler: Reconciler,
    calculator: ExciseCalculator,
    materializer: Materializer,
    metrics: Metrics,
}

impl ReportService {
    /// Create new reporting service
    pub fn new(
        config: Config,
        store: Arc<dyn PeriodStore>,
        movements: Arc<dyn MovementLog>,
        counter: Arc<CbmaCounter>,
    ) -> Result<Self> {
        config.validate()?;

        let calculator = ExciseCalculator::from_config(&config.excise)?;
        let ceiling = calculator
            .table()
            .reduced_rate_ceiling()
            .unwrap_or(Decimal::ZERO);
        if counter.reduced_rate_ceiling() != ceiling {
            return Err(Error::Config(format!(
                "CBMA counter ceiling {} does not match the rate table's first band {}",
                counter.reduced_rate_ceiling(),
                ceiling
            )));
        }
        let reconciler = Reconciler::new(config.ledger.reconcile.clone());
        let metrics = Metrics::new()?;

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            tolerance_bbl = %reconciler.tolerance(),
            "Reporting service initialized"
        );

        Ok(Self {
            config,
            store,
            movements,
            counter,
            aggregator: Aggregator::new(),
            reconciler,
            calculator,
            materializer: Materializer::new(),
            metrics,
        })
    }

    /// Open a period starting on `start`
    pub fn open_period(
        &self,
        workspace: WorkspaceId,
        period_type: PeriodType,
        start: NaiveDate,
    ) -> Result<Period> {
        let period = Period::new(workspace, period_type, start, &self.config.ledger.due_dates)?;
        self.store.insert_period(period.clone())?;
        Ok(period)
    }

    /// Open every period of a type for a tax year
    pub fn open_year(
        &self,
        workspace: &WorkspaceId,
        period_type: PeriodType,
        year: i32,
    ) -> Result<Vec<Period>> {
        let periods =
            PeriodSchedule::for_year(workspace, period_type, year, &self.config.ledger.due_dates)?;
        for period in &periods {
            self.store.insert_period(period.clone())?;
        }
        Ok(periods)
    }

    /// Periods of a workspace, ordered by start date
    pub fn periods(&self, workspace: &WorkspaceId) -> Result<Vec<Period>> {
        self.store.periods(workspace)
    }

    /// Generate (or regenerate) the draft for a period
    pub fn generate(&self, period_id: Uuid) -> Result<DraftReport> {
        let started = Instant::now();
        let period = self.store.period(period_id)?;
        if period.is_finalized() {
            return Err(Error::AlreadyFinalized(period_id));
        }

        let draft = self.compute(&period)?;
        let stored = self.store.save_draft(draft)?;

        self.metrics.record_draft(
            stored
                .reconciliation
                .anomalies
                .iter()
                .map(|a| a.severity.as_str()),
        );
        self.metrics
            .record_generate_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            period_id = %period_id,
            workspace = %period.workspace,
            revision = stored.revision,
            is_valid = stored.reconciliation.is_valid,
            variance_bbl = %stored.reconciliation.variance_bbl,
            anomalies = stored.reconciliation.anomalies.len(),
            total_tax_cents = stored.allocation.total_tax_cents,
            "Draft generated"
        );

        Ok(stored)
    }

    /// Compute a draft without storing it
    pub fn preview(&self, period_id: Uuid) -> Result<DraftReport> {
        let period = self.store.period(period_id)?;
        self.compute(&period)
    }

    /// Freeze the reviewed draft
    pub fn finalize(&self, period_id: Uuid, request: FinalizeRequest) -> Result<PeriodSnapshot> {
        let period = self.store.period(period_id)?;
        if period.is_finalized() {
            self.metrics.record_finalize_conflict();
            return Err(Error::AlreadyFinalized(period_id));
        }

        let draft = self
            .store
            .draft(period_id)?
            .ok_or(Error::DraftMissing(period_id))?;
        if draft.revision != request.revision {
            self.metrics.record_finalize_conflict();
            return Err(Error::StaleDraft {
                period_id,
                expected: request.revision,
                current: draft.revision,
            });
        }

        if draft.reconciliation.needs_review() && !request.acknowledge_anomalies {
            return Err(Error::ConfirmationRequired {
                period_id,
                anomalies: draft.reconciliation.anomalies.len(),
                is_valid: draft.reconciliation.is_valid,
            });
        }

        let snapshot = self.materializer.finalize(
            &draft.period,
            &draft.ledger,
            &draft.opening,
            &draft.reconciliation,
            &draft.allocation,
            &request.actor,
            request.acknowledge_anomalies,
        )?;

        let snapshot = match self.store.finalize(period_id, request.revision, snapshot) {
            Ok(snapshot) => snapshot,
            Err(err @ (Error::AlreadyFinalized(_) | Error::StaleDraft { .. })) => {
                self.metrics.record_finalize_conflict();
                tracing::warn!(period_id = %period_id, error = %err, "Finalize lost the race");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let ytd_bbl = self
            .counter
            .record(period.tax_year(), snapshot.allocation.taxable_bbl)?;
        self.metrics
            .record_finalized(snapshot.allocation.total_tax_cents);

        tracing::info!(
            period_id = %period_id,
            workspace = %period.workspace,
            actor = %snapshot.finalized_by,
            acknowledged = snapshot.acknowledged_anomalies,
            hash = %snapshot.hash_hex(),
            ytd_bbl = %ytd_bbl,
            "Period finalized"
        );

        Ok(snapshot)
    }

    /// Current report: the snapshot once finalized, the draft before that
    pub fn report(&self, period_id: Uuid) -> Result<PeriodReport> {
        let period = self.store.period(period_id)?;
        if period.is_finalized() {
            let snapshot = self
                .store
                .snapshot(period_id)?
                .ok_or(Error::Integrity(period_id))?;
            return Ok(PeriodReport::Finalized(snapshot));
        }

        self.store
            .draft(period_id)?
            .map(PeriodReport::Draft)
            .ok_or(Error::DraftMissing(period_id))
    }

    /// CBMA counter shared by the workspace's periods
    pub fn counter(&self) -> &CbmaCounter {
        &self.counter
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn compute(&self, period: &Period) -> Result<DraftReport> {
        let opening = self.resolve_opening(period)?;
        let ledger = self.aggregator.aggregate(
            &*self.movements,
            &period.workspace,
            period.start,
            period.end,
            &opening,
        )?;
        let reconciliation = self.reconciler.reconcile(&ledger);

        // Negative net removals are flagged by reconciliation, never taxed
        let taxable_bbl = reconciliation.removed_tax_bbl.max(Decimal::ZERO);
        let allocation = self
            .calculator
            .allocate(taxable_bbl, self.counter.used(period.tax_year()))?;

        Ok(DraftReport {
            period: period.clone(),
            revision: 0,
            opening,
            ledger,
            reconciliation,
            allocation,
            generated_at: Utc::now(),
        })
    }

    fn resolve_opening(&self, period: &Period) -> Result<OpeningBalance> {
        if let Some(prior) = self
            .store
            .latest_finalized_before(&period.workspace, period.start)?
        {
            return Ok(OpeningBalance::Chained {
                prior_period_id: prior.period.period_id,
                prior_end: prior.period.end,
                closing_bbl: prior.closing_bbl(),
                as_of: prior.as_of,
            });
        }

        // An earlier period that is not finalized breaks the chain
        let earlier: Vec<Period> = self
            .store
            .periods(&period.workspace)?
            .into_iter()
            .filter(|p| p.end < period.start)
            .collect();
        if !earlier.is_empty() {
            let detail = match period
                .previous_day_of_start()
                .and_then(|day| earlier.iter().find(|p| p.contains(day)))
            {
                Some(prior) => format!(
                    "prior period {} ({} to {}) is {:?}, not finalized",
                    prior.period_id, prior.start, prior.end, prior.status
                ),
                None => format!(
                    "{} earlier period(s) exist but none is finalized",
                    earlier.len()
                ),
            };
            return Err(brop_ledger::Error::DataGap {
                workspace: period.workspace.to_string(),
                period_start: period.start,
                detail,
            }
            .into());
        }

        Ok(self
            .config
            .initial_opening(period.workspace.as_str())
            .map(OpeningBalance::Initial)
            .unwrap_or(OpeningBalance::Missing))
    }
}

impl fmt::Debug for ReportService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportService")
            .field("service", &self.config.service_name)
            .field("calculator", &self.calculator)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
