//! Movement log
//!
//! Append-only record of volume movements. Batch completion, packaging,
//! removals and adjustments all land here; nothing is edited or deleted.
//! Corrections are new movements.

use crate::{
    types::{Movement, WorkspaceId},
    Error, Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Read access to recorded movements
pub trait MovementLog: Send + Sync {
    /// Movements whose business date lies in `[start, end]`
    fn movements_in(
        &self,
        workspace: &WorkspaceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Movement>>;

    /// Movements dated before `before` but entered after `recorded_after`
    fn late_corrections(
        &self,
        workspace: &WorkspaceId,
        before: NaiveDate,
        recorded_after: DateTime<Utc>,
    ) -> Result<Vec<Movement>>;
}

/// In-memory movement log
#[derive(Debug, Default)]
pub struct InMemoryMovementLog {
    movements: RwLock<Vec<Movement>>,
}

impl InMemoryMovementLog {
    /// Create empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a movement
    pub fn record(&self, movement: Movement) -> Result<()> {
        validate_movement(&movement)?;

        tracing::debug!(
            movement_id = %movement.movement_id,
            workspace = %movement.workspace,
            category = ?movement.category,
            quantity_bbl = %movement.quantity_bbl,
            "Recorded movement"
        );

        self.movements.write().push(movement);
        Ok(())
    }

    /// Number of recorded movements
    pub fn len(&self) -> usize {
        self.movements.read().len()
    }

    /// Check if log is empty
    pub fn is_empty(&self) -> bool {
        self.movements.read().is_empty()
    }

    fn select(&self, predicate: impl Fn(&Movement) -> bool) -> Vec<Movement> {
        let mut selected: Vec<Movement> = self
            .movements
            .read()
            .iter()
            .filter(|m| predicate(m))
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            (a.occurred_on, a.recorded_at, a.movement_id)
                .cmp(&(b.occurred_on, b.recorded_at, b.movement_id))
        });
        selected
    }
}

impl MovementLog for InMemoryMovementLog {
    fn movements_in(
        &self,
        workspace: &WorkspaceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Movement>> {
        Ok(self.select(|m| &m.workspace == workspace && m.occurred_on >= start && m.occurred_on <= end))
    }

    fn late_corrections(
        &self,
        workspace: &WorkspaceId,
        before: NaiveDate,
        recorded_after: DateTime<Utc>,
    ) -> Result<Vec<Movement>> {
        Ok(self.select(|m| {
            &m.workspace == workspace && m.occurred_on < before && m.recorded_at > recorded_after
        }))
    }
}

fn validate_movement(movement: &Movement) -> Result<()> {
    if movement.quantity_bbl == Decimal::ZERO {
        return Err(Error::InvalidMovement(format!(
            "movement {} has zero quantity",
            movement.movement_id
        )));
    }

    if movement.category.direction() == crate::types::Direction::Balance
        && movement.quantity_bbl.is_sign_negative()
    {
        return Err(Error::InvalidMovement(format!(
            "inventory count {} cannot be negative",
            movement.movement_id
        )));
    }

    Ok(())
}
