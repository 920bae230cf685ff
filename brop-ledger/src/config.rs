//! Configuration for the BROP ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Reconciliation configuration
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Filing due dates
    #[serde(default)]
    pub due_dates: DueDateConfig,
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Maximum absolute variance still considered balanced (barrels)
    pub tolerance_bbl: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance_bbl: Decimal::new(1, 2), // 0.01 bbl
        }
    }
}

/// Days after period end that the report is due
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueDateConfig {
    /// Monthly reports
    pub monthly_days: u32,

    /// Quarterly reports
    pub quarterly_days: u32,

    /// Semi-monthly reports
    pub semi_monthly_days: u32,

    /// Annual reports
    pub annual_days: u32,
}

impl Default for DueDateConfig {
    fn default() -> Self {
        Self {
            monthly_days: 15,
            quarterly_days: 15,
            semi_monthly_days: 14,
            annual_days: 15,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(tolerance) = std::env::var("BROP_TOLERANCE_BBL") {
            config.reconcile.tolerance_bbl = tolerance
                .parse()
                .map_err(|e| crate::Error::Config(format!("BROP_TOLERANCE_BBL: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.reconcile.tolerance_bbl.is_sign_negative() {
            return Err(crate::Error::Config(format!(
                "tolerance_bbl must not be negative, got {}",
                self.reconcile.tolerance_bbl
            )));
        }
        Ok(())
    }
}
