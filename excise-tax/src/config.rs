//! Configuration for excise tax calculation

use crate::{
    bands::{default_bands, BandConfig, BandId, RateTable, RoundingMode},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Excise configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExciseConfig {
    /// Rate bands, lowest first
    #[serde(default = "default_bands")]
    pub bands: Vec<BandConfig>,

    /// Rounding of band tax to whole cents
    #[serde(default)]
    pub rounding: RoundingMode,
}

impl Default for ExciseConfig {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            rounding: RoundingMode::HalfUp,
        }
    }
}

impl ExciseConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExciseConfig = toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse excise config: {}", e)))?;
        config.rate_table()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = ExciseConfig::default();

        if let Ok(rate) = std::env::var("EXCISE_REDUCED_RATE_CENTS") {
            let rate: i64 = rate
                .parse()
                .map_err(|e| Error::Configuration(format!("EXCISE_REDUCED_RATE_CENTS: {}", e)))?;
            config.set_rate(BandId::First60k, rate)?;
        }

        if let Ok(rounding) = std::env::var("EXCISE_ROUNDING") {
            config.rounding = match rounding.as_str() {
                "half_up" => RoundingMode::HalfUp,
                "half_even" => RoundingMode::HalfEven,
                other => {
                    return Err(Error::Configuration(format!(
                        "EXCISE_ROUNDING must be half_up or half_even, got {}",
                        other
                    )))
                }
            };
        }

        config.rate_table()?;
        Ok(config)
    }

    /// Override a band's rate
    pub fn set_rate(&mut self, band_id: BandId, rate_cents_per_bbl: i64) -> Result<()> {
        let band = self
            .bands
            .iter_mut()
            .find(|b| b.band_id == band_id)
            .ok_or_else(|| Error::Configuration(format!("no band {} configured", band_id)))?;
        band.rate_cents_per_bbl = rate_cents_per_bbl;
        Ok(())
    }

    /// Validated rate table
    pub fn rate_table(&self) -> Result<RateTable> {
        RateTable::new(self.bands.clone(), self.rounding)
    }
}
