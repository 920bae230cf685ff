//! Configuration for the reporting service

use crate::{Error, Result};
use excise_tax::ExciseConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reporting service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Reconciliation tolerance and filing due dates
    pub ledger: brop_ledger::Config,

    /// CBMA rate bands and rounding
    pub excise: ExciseConfig,

    /// Physical opening counts for each workspace's first reporting period
    pub initial_openings: BTreeMap<String, Decimal>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "brop-report".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger: brop_ledger::Config::default(),
            excise: ExciseConfig::default(),
            initial_openings: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config {
            ledger: brop_ledger::Config::from_env()?,
            excise: ExciseConfig::from_env()?,
            ..Config::default()
        };

        if let Ok(name) = std::env::var("BROP_SERVICE_NAME") {
            config.service_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check nested sections and opening counts
    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        self.excise.rate_table()?;

        for (workspace, opening) in &self.initial_openings {
            if opening.is_sign_negative() && !opening.is_zero() {
                return Err(Error::Config(format!(
                    "initial opening for {} must not be negative, got {}",
                    workspace, opening
                )));
            }
        }
        Ok(())
    }

    /// Configured first-period opening count for a workspace
    pub fn initial_opening(&self, workspace: &str) -> Option<Decimal> {
        self.initial_openings.get(workspace).copied()
    }
}
