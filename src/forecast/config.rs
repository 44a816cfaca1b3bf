use super::{ForecastError, ForecastResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run parameters, read from an optional JSON file and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForecastConfig {
    pub trials: u32,
    /// Base seed; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Date poll ages are measured against; `None` means today.
    pub reference_date: Option<NaiveDate>,
    /// Poll scope fed to the weighting.
    pub region: String,
    pub parallel: bool,
    /// Trials per parallel batch.
    pub chunk_size: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            trials: 10_000,
            seed: None,
            reference_date: None,
            region: "National".to_string(),
            parallel: true,
            chunk_size: 250,
        }
    }
}

impl ForecastConfig {
    pub fn from_file(path: &Path) -> ForecastResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ForecastError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.trials < 1 {
            return Err(ForecastError::Configuration(format!(
                "trial count must be at least 1, got {}",
                self.trials
            )));
        }
        if self.chunk_size < 1 {
            return Err(ForecastError::Configuration(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(ForecastError::Configuration(
                "poll region must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}
