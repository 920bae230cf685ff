//! Period, draft and snapshot storage
//!
//! The store owns the period status. Drafts carry a revision that increases
//! on every regeneration; finalization succeeds only against the revision
//! the caller reviewed, and only once.

use crate::{materializer::PeriodSnapshot, Error, Result};
use brop_ledger::{
    OpeningBalance, Period, PeriodLedger, PeriodStatus, ReconciliationResult, WorkspaceId,
};
use chrono::{DateTime, NaiveDate, Utc};
use excise_tax::Allocation;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Generated, not yet frozen, period report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftReport {
    /// Period as of generation
    pub period: Period,

    /// Draft revision (0 until stored)
    pub revision: u64,

    /// Opening balance source
    pub opening: OpeningBalance,

    /// Aggregated ledger
    pub ledger: PeriodLedger,

    /// Reconciliation of the ledger
    pub reconciliation: ReconciliationResult,

    /// Excise allocation of taxable removals
    pub allocation: Allocation,

    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
}

/// Persistence for periods and their reports
pub trait PeriodStore: Send + Sync {
    /// Register a new open period
    fn insert_period(&self, period: Period) -> Result<()>;

    /// Fetch a period
    fn period(&self, period_id: Uuid) -> Result<Period>;

    /// All periods of a workspace, ordered by start date
    fn periods(&self, workspace: &WorkspaceId) -> Result<Vec<Period>>;

    /// Store a draft, moving the period to draft status; returns the stored draft
    fn save_draft(&self, draft: DraftReport) -> Result<DraftReport>;

    /// Current draft, if any
    fn draft(&self, period_id: Uuid) -> Result<Option<DraftReport>>;

    /// Atomically freeze the period if its draft is still at `expected_revision`
    fn finalize(
        &self,
        period_id: Uuid,
        expected_revision: u64,
        snapshot: PeriodSnapshot,
    ) -> Result<PeriodSnapshot>;

    /// Snapshot of a finalized period
    fn snapshot(&self, period_id: Uuid) -> Result<Option<PeriodSnapshot>>;

    /// Most recent snapshot of the workspace ending before `date`
    fn latest_finalized_before(
        &self,
        workspace: &WorkspaceId,
        date: NaiveDate,
    ) -> Result<Option<PeriodSnapshot>>;
}

#[derive(Debug, Default)]
struct StoreState {
    periods: HashMap<Uuid, Period>,
    drafts: HashMap<Uuid, DraftReport>,
    snapshots: HashMap<Uuid, PeriodSnapshot>,
}

impl StoreState {
    fn period_mut(&mut self, period_id: Uuid) -> Result<&mut Period> {
        self.periods
            .get_mut(&period_id)
            .ok_or(Error::PeriodNotFound(period_id))
    }
}

/// In-memory period store
#[derive(Debug, Default)]
pub struct InMemoryPeriodStore {
    state: RwLock<StoreState>,
}

impl InMemoryPeriodStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeriodStore for InMemoryPeriodStore {
    fn insert_period(&self, period: Period) -> Result<()> {
        let mut state = self.state.write();

        if let Some(existing) = state.periods.values().find(|p| {
            p.workspace == period.workspace && p.start <= period.end && period.start <= p.end
        }) {
            return Err(Error::PeriodOverlap {
                existing: existing.period_id,
            });
        }

        tracing::info!(
            period_id = %period.period_id,
            workspace = %period.workspace,
            start = %period.start,
            end = %period.end,
            period_type = %period.period_type,
            "Opened period"
        );

        state.periods.insert(period.period_id, period);
        Ok(())
    }

    fn period(&self, period_id: Uuid) -> Result<Period> {
        self.state
            .read()
            .periods
            .get(&period_id)
            .cloned()
            .ok_or(Error::PeriodNotFound(period_id))
    }

    fn periods(&self, workspace: &WorkspaceId) -> Result<Vec<Period>> {
        let mut periods: Vec<Period> = self
            .state
            .read()
            .periods
            .values()
            .filter(|p| &p.workspace == workspace)
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.start);
        Ok(periods)
    }

    fn save_draft(&self, mut draft: DraftReport) -> Result<DraftReport> {
        let period_id = draft.period.period_id;
        let mut state = self.state.write();

        let period = state.period_mut(period_id)?;
        period.transition(PeriodStatus::Draft)?;
        draft.period = period.clone();

        draft.revision = state
            .drafts
            .get(&period_id)
            .map(|previous| previous.revision + 1)
            .unwrap_or(1);
        state.drafts.insert(period_id, draft.clone());

        Ok(draft)
    }

    fn draft(&self, period_id: Uuid) -> Result<Option<DraftReport>> {
        Ok(self.state.read().drafts.get(&period_id).cloned())
    }

    fn finalize(
        &self,
        period_id: Uuid,
        expected_revision: u64,
        snapshot: PeriodSnapshot,
    ) -> Result<PeriodSnapshot> {
        let mut state = self.state.write();

        let status = state.period_mut(period_id)?.status;
        match status {
            PeriodStatus::Finalized => return Err(Error::AlreadyFinalized(period_id)),
            PeriodStatus::Open => {
                return Err(Error::InvalidTransition {
                    period_id,
                    status,
                    detail: "no draft to finalize".to_string(),
                })
            }
            PeriodStatus::Draft => {}
        }

        let current = state
            .drafts
            .get(&period_id)
            .map(|d| d.revision)
            .ok_or(Error::DraftMissing(period_id))?;
        if current != expected_revision {
            return Err(Error::StaleDraft {
                period_id,
                expected: expected_revision,
                current,
            });
        }

        if snapshot.period.period_id != period_id {
            return Err(Error::Inconsistent(format!(
                "snapshot for period {} offered to period {}",
                snapshot.period.period_id, period_id
            )));
        }

        state.period_mut(period_id)?.transition(PeriodStatus::Finalized)?;
        state.snapshots.insert(period_id, snapshot.clone());

        Ok(snapshot)
    }

    fn snapshot(&self, period_id: Uuid) -> Result<Option<PeriodSnapshot>> {
        Ok(self.state.read().snapshots.get(&period_id).cloned())
    }

    fn latest_finalized_before(
        &self,
        workspace: &WorkspaceId,
        date: NaiveDate,
    ) -> Result<Option<PeriodSnapshot>> {
        Ok(self
            .state
            .read()
            .snapshots
            .values()
            .filter(|s| &s.period.workspace == workspace && s.period.end < date)
            .max_by_key(|s| s.period.end)
            .cloned())
    }
}
