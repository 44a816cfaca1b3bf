// Monte Carlo riding forecast: poll weighting, noise, per-riding projection,
// trial aggregation and summary statistics.

pub mod aggregate;
pub mod config;
pub mod noise;
pub mod projection;
pub mod simulation;
pub mod summary;
pub mod weighting;

use crate::database::DatabaseError;
use crate::model::Party;

pub use aggregate::{AggregateResult, TrialOutcome};
pub use config::ForecastConfig;
pub use noise::{ErrorModel, NormalErrorModel, ZeroErrorModel};
pub use projection::{project_district, DistrictOutcome};
pub use simulation::{ForecastInputs, Simulation};
pub use summary::ForecastSummary;
pub use weighting::{poll_weight, PollAverage};

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub type ForecastResult<T> = std::result::Result<T, ForecastError>;

/// Recoverable condition hit while projecting one riding in one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistrictIssue {
    /// The party was dropped from the riding for this trial.
    MissingPartyData { party: Party, reason: MissingReason },
    /// Every projected share clamped to zero; no winner recorded.
    DegenerateNormalization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    NoPollAverage,
    NoNationalBaseline,
    ZeroNationalBaseline,
    MalformedBaseline,
}

impl std::fmt::Display for MissingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingReason::NoPollAverage => write!(f, "no_poll_average"),
            MissingReason::NoNationalBaseline => write!(f, "no_national_baseline"),
            MissingReason::ZeroNationalBaseline => write!(f, "zero_national_baseline"),
            MissingReason::MalformedBaseline => write!(f, "malformed_baseline"),
        }
    }
}
