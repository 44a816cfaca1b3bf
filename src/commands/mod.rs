mod forecast;
mod ingest;
mod polls;

pub use forecast::{forecast, ForecastOptions};
pub use ingest::{ingest, init};
pub use polls::polls;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Database URL for a file path
pub(crate) fn sqlite_url(path: &std::path::Path) -> String {
    format!("sqlite:{}", path.display())
}
