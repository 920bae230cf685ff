//! Core types for the BROP ledger
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal barrels, never binary floating point)
//! - Stable serialization (serde, snake_case category names)
//! - Immutability once recorded

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Workspace (brewery premises) identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Create new workspace ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a category moves the bonded balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Physical count (opening / closing), not a movement
    Balance,
    /// Increases beer on hand
    Addition,
    /// Decreases beer on hand
    Removal,
}

/// BROP line category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// On hand beginning of period
    Opening,
    /// Produced by fermentation
    Produced,
    /// Received in bond from other breweries
    ReceivedInBond,
    /// Returned to brewery after removal
    ReturnedToBrewery,
    /// Removed tax determined
    RemovedTaxDetermined,
    /// Removed without payment of tax
    RemovedWithoutTax,
    /// Consumed on brewery premises
    ConsumedOnPremises,
    /// Destroyed under supervision
    Destroyed,
    /// Known losses (breakage, dumping, leakage)
    Loss,
    /// Unexplained shortage found on inventory
    Shortage,
    /// On hand end of period
    Closing,
}

impl Category {
    /// All categories in line-code order
    pub const ALL: [Category; 11] = [
        Category::Opening,
        Category::Produced,
        Category::ReceivedInBond,
        Category::ReturnedToBrewery,
        Category::RemovedTaxDetermined,
        Category::RemovedWithoutTax,
        Category::ConsumedOnPremises,
        Category::Destroyed,
        Category::Loss,
        Category::Shortage,
        Category::Closing,
    ];

    /// Report line code
    pub fn line_code(&self) -> u8 {
        match self {
            Category::Opening => 1,
            Category::Produced => 2,
            Category::ReceivedInBond => 3,
            Category::ReturnedToBrewery => 4,
            Category::RemovedTaxDetermined => 5,
            Category::RemovedWithoutTax => 6,
            Category::ConsumedOnPremises => 7,
            Category::Destroyed => 8,
            Category::Loss => 9,
            Category::Shortage => 10,
            Category::Closing => 11,
        }
    }

    /// Report line label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Opening => "On hand beginning of period",
            Category::Produced => "Produced by fermentation",
            Category::ReceivedInBond => "Received in bond",
            Category::ReturnedToBrewery => "Returned to brewery",
            Category::RemovedTaxDetermined => "Removed tax determined",
            Category::RemovedWithoutTax => "Removed without payment of tax",
            Category::ConsumedOnPremises => "Consumed on premises",
            Category::Destroyed => "Destroyed",
            Category::Loss => "Losses",
            Category::Shortage => "Shortage",
            Category::Closing => "On hand end of period",
        }
    }

    /// Effect on the running balance
    pub fn direction(&self) -> Direction {
        match self {
            Category::Opening | Category::Closing => Direction::Balance,
            Category::Produced | Category::ReceivedInBond | Category::ReturnedToBrewery => {
                Direction::Addition
            }
            _ => Direction::Removal,
        }
    }

    /// Negative totals are tolerated here (inventory gains)
    pub fn allows_negative(&self) -> bool {
        matches!(self, Category::Loss | Category::Shortage)
    }

    /// Signed contribution of a quantity to the running balance
    pub fn signed(&self, quantity_bbl: Decimal) -> Decimal {
        match self.direction() {
            Direction::Balance => Decimal::ZERO,
            Direction::Addition => quantity_bbl,
            Direction::Removal => -quantity_bbl,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Kind of operation that produced a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Batch completion
    Batch,
    /// Packaging run
    Packaging,
    /// Sales / removal ingestion
    Sale,
    /// In-bond transfer
    Transfer,
    /// Manual inventory adjustment
    Adjustment,
    /// Physical inventory count
    InventoryCount,
}

/// Origin of a movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSource {
    /// Operation kind
    pub kind: SourceKind,
    /// External reference (batch number, invoice, count sheet)
    pub reference: String,
}

impl MovementSource {
    /// Create new source
    pub fn new(kind: SourceKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
        }
    }
}

/// A single recorded volume movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    /// Unique movement ID
    pub movement_id: Uuid,

    /// Owning workspace
    pub workspace: WorkspaceId,

    /// BROP category
    pub category: Category,

    /// Volume in barrels
    pub quantity_bbl: Decimal,

    /// Business date of the movement
    pub occurred_on: NaiveDate,

    /// When the movement was entered
    pub recorded_at: DateTime<Utc>,

    /// Originating operation
    pub source: MovementSource,

    /// Production record still incomplete
    #[serde(default)]
    pub provisional: bool,

    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl Movement {
    /// Create a movement recorded now
    pub fn new(
        workspace: WorkspaceId,
        category: Category,
        quantity_bbl: Decimal,
        occurred_on: NaiveDate,
        source: MovementSource,
    ) -> Self {
        Self {
            movement_id: Uuid::new_v4(),
            workspace,
            category,
            quantity_bbl,
            occurred_on,
            recorded_at: Utc::now(),
            source,
            provisional: false,
            notes: None,
        }
    }

    /// Mark as provisional (incomplete production record)
    pub fn provisional(mut self) -> Self {
        self.provisional = true;
        self
    }

    /// Override the recording instant
    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = at;
        self
    }

    /// Attach notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Signed effect on the running balance
    pub fn net_effect(&self) -> Decimal {
        self.category.signed(self.quantity_bbl)
    }
}

/// One aggregated BROP line for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodLedgerEntry {
    /// Report line code
    pub line_code: u8,

    /// Category
    pub category: Category,

    /// Total barrels for the period
    pub quantity_bbl: Decimal,

    /// Explanatory notes
    #[serde(default)]
    pub notes: Option<String>,
}

impl PeriodLedgerEntry {
    /// Create entry for a category
    pub fn new(category: Category, quantity_bbl: Decimal) -> Self {
        Self {
            line_code: category.line_code(),
            category,
            quantity_bbl,
            notes: None,
        }
    }
}
