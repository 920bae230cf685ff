//! Reporting periods
//!
//! A period covers an inclusive date range inside a single calendar (tax)
//! year and moves through `open → draft → finalized`. Drafts can be
//! regenerated any number of times; finalization happens once.

use crate::{config::DueDateConfig, types::WorkspaceId, Error, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reporting frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Calendar month
    Monthly,
    /// Calendar quarter
    Quarterly,
    /// 1st–15th and 16th–end of month
    SemiMonthly,
    /// Calendar year
    Annual,
}

impl PeriodType {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Monthly => "monthly",
            PeriodType::Quarterly => "quarterly",
            PeriodType::SemiMonthly => "semi_monthly",
            PeriodType::Annual => "annual",
        }
    }

    fn due_days(&self, due_dates: &DueDateConfig) -> u32 {
        match self {
            PeriodType::Monthly => due_dates.monthly_days,
            PeriodType::Quarterly => due_dates.quarterly_days,
            PeriodType::SemiMonthly => due_dates.semi_monthly_days,
            PeriodType::Annual => due_dates.annual_days,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Period lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    /// Created, nothing generated yet
    Open,
    /// Report generated, may be regenerated
    Draft,
    /// Frozen snapshot (terminal)
    Finalized,
}

impl PeriodStatus {
    /// Stable name
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Draft => "draft",
            PeriodStatus::Finalized => "finalized",
        }
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Unique period ID
    pub period_id: Uuid,

    /// Owning workspace
    pub workspace: WorkspaceId,

    /// Frequency
    pub period_type: PeriodType,

    /// First day (inclusive)
    pub start: NaiveDate,

    /// Last day (inclusive)
    pub end: NaiveDate,

    /// Filing due date
    pub due_date: NaiveDate,

    /// Lifecycle status
    pub status: PeriodStatus,
}

impl Period {
    /// Create an open period starting on `start`
    pub fn new(
        workspace: WorkspaceId,
        period_type: PeriodType,
        start: NaiveDate,
        due_dates: &DueDateConfig,
    ) -> Result<Self> {
        let end = period_end(period_type, start)?;
        let due_date = end
            .checked_add_days(Days::new(u64::from(period_type.due_days(due_dates))))
            .ok_or_else(|| Error::InvalidPeriod(format!("due date out of range for {}", end)))?;

        Ok(Self {
            period_id: Uuid::new_v4(),
            workspace,
            period_type,
            start,
            end,
            due_date,
            status: PeriodStatus::Open,
        })
    }

    /// Tax year the period belongs to
    pub fn tax_year(&self) -> i32 {
        self.start.year()
    }

    /// Check if date falls inside the period
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Day before the period starts (closing date of the prior period)
    pub fn previous_day_of_start(&self) -> Option<NaiveDate> {
        self.start.pred_opt()
    }

    /// Check if period is in terminal state
    pub fn is_finalized(&self) -> bool {
        matches!(self.status, PeriodStatus::Finalized)
    }

    /// Move to a new status
    pub fn transition(&mut self, to: PeriodStatus) -> Result<()> {
        validate_status_transition(self, to)?;
        self.status = to;
        Ok(())
    }
}

fn validate_status_transition(period: &Period, to: PeriodStatus) -> Result<()> {
    match (period.status, to) {
        (PeriodStatus::Finalized, _) => Err(Error::AlreadyFinalized(period.period_id)),
        (PeriodStatus::Open, PeriodStatus::Draft)
        | (PeriodStatus::Draft, PeriodStatus::Draft)
        | (PeriodStatus::Draft, PeriodStatus::Finalized) => Ok(()),
        (from, to) => Err(Error::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Period calendar for a tax year
#[derive(Debug)]
pub struct PeriodSchedule;

impl PeriodSchedule {
    /// All periods of a type in a calendar year, in order
    pub fn for_year(
        workspace: &WorkspaceId,
        period_type: PeriodType,
        year: i32,
        due_dates: &DueDateConfig,
    ) -> Result<Vec<Period>> {
        let mut periods = Vec::new();
        let mut current = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::InvalidPeriod(format!("year {} out of range", year)))?;

        while current.year() == year {
            let period = Period::new(workspace.clone(), period_type, current, due_dates)?;
            current = match period.end.succ_opt() {
                Some(next) => next,
                None => break,
            };
            periods.push(period);
        }

        Ok(periods)
    }
}

fn period_end(period_type: PeriodType, start: NaiveDate) -> Result<NaiveDate> {
    let invalid = || {
        Error::InvalidPeriod(format!(
            "{} is not a valid {} period start",
            start, period_type
        ))
    };

    match period_type {
        PeriodType::Monthly => {
            if start.day() != 1 {
                return Err(invalid());
            }
            last_day_of_month(start.year(), start.month())
        }
        PeriodType::SemiMonthly => match start.day() {
            1 => NaiveDate::from_ymd_opt(start.year(), start.month(), 15).ok_or_else(invalid),
            16 => last_day_of_month(start.year(), start.month()),
            _ => Err(invalid()),
        },
        PeriodType::Quarterly => {
            if start.day() != 1 || !matches!(start.month(), 1 | 4 | 7 | 10) {
                return Err(invalid());
            }
            last_day_of_month(start.year(), start.month() + 2)
        }
        PeriodType::Annual => {
            if start.day() != 1 || start.month() != 1 {
                return Err(invalid());
            }
            NaiveDate::from_ymd_opt(start.year(), 12, 31).ok_or_else(invalid)
        }
    }
}

/// Returns the last day of a month.
fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    next_month
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::InvalidPeriod(format!("month {}-{} out of range", year, month)))
}
