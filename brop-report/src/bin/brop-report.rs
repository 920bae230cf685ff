//! Generate a BROP draft from a JSON movement file
//!
//! ```text
//! brop-report <input.json>
//! ```
//!
//! Configuration comes from the TOML file named by `BROP_CONFIG`, or from
//! defaults plus `BROP_*` / `EXCISE_*` environment overrides.

use anyhow::{bail, Context};
use brop_ledger::{
    Category, InMemoryMovementLog, Movement, MovementSource, PeriodType, WorkspaceId,
};
use brop_report::{Config, InMemoryPeriodStore, ReportService};
use chrono::NaiveDate;
use excise_tax::CbmaCounter;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Input {
    workspace: String,
    period_type: PeriodType,
    start: NaiveDate,
    opening_bbl: Decimal,
    #[serde(default)]
    ytd_used_bbl: Decimal,
    #[serde(default)]
    movements: Vec<MovementInput>,
}

#[derive(Debug, Deserialize)]
struct MovementInput {
    category: Category,
    quantity_bbl: Decimal,
    occurred_on: NaiveDate,
    source: MovementSource,
    #[serde(default)]
    provisional: bool,
    #[serde(default)]
    notes: Option<String>,
}

fn load_config() -> anyhow::Result<Config> {
    match std::env::var("BROP_CONFIG") {
        Ok(path) => {
            Config::from_file(&path).with_context(|| format!("loading config from {}", path))
        }
        Err(_) => Config::from_env().context("loading config from environment"),
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: brop-report <input.json>"),
    };

    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let input: Input = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;

    let mut config = load_config()?;
    config
        .initial_openings
        .insert(input.workspace.clone(), input.opening_bbl);
    tracing::info!(service = %config.service_name, input = %path, "Starting BROP report");

    let workspace = WorkspaceId::new(input.workspace);
    let log = Arc::new(InMemoryMovementLog::new());
    for movement in input.movements {
        let mut recorded = Movement::new(
            workspace.clone(),
            movement.category,
            movement.quantity_bbl,
            movement.occurred_on,
            movement.source,
        );
        if movement.provisional {
            recorded = recorded.provisional();
        }
        if let Some(notes) = movement.notes {
            recorded = recorded.with_notes(notes);
        }
        log.record(recorded)?;
    }

    let counter = Arc::new(CbmaCounter::from_table(&config.excise.rate_table()?));
    let service = ReportService::new(
        config,
        Arc::new(InMemoryPeriodStore::new()),
        log,
        counter.clone(),
    )?;

    let period = service.open_period(workspace, input.period_type, input.start)?;
    counter.seed(period.tax_year(), input.ytd_used_bbl)?;

    let draft = service.generate(period.period_id)?;
    println!("{}", serde_json::to_string_pretty(&draft)?);

    tracing::debug!(metrics = %service.metrics().render()?, "Final metrics");
    Ok(())
}
