pub mod ingestion;
pub mod metrics;
pub mod schema;

use crate::model::{District, Lean, NationalBaseline, Party, PartyMap, Poll};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Data integrity error: {0}")]
    Integrity(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Rows dropped while loading.
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    /// Untracked party label -> rows.
    pub unknown_parties: BTreeMap<String, usize>,
    /// (riding, party) -> result rows without a vote percentage.
    pub missing_shares: BTreeMap<(i64, Party), usize>,
}

impl LoadReport {
    fn unknown(&mut self, label: &str) {
        *self.unknown_parties.entry(label.to_string()).or_insert(0) += 1;
    }

    fn missing_share(&mut self, riding_id: i64, party: Party) {
        *self.missing_shares.entry((riding_id, party)).or_insert(0) += 1;
    }

    pub fn skipped_rows(&self) -> usize {
        self.unknown_parties.values().sum::<usize>() + self.missing_shares.values().sum::<usize>()
    }
}

/// Historical results and polls feeding the forecast.
#[derive(Clone)]
pub struct ForecastDatabase {
    pool: SqlitePool,
}

impl ForecastDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database. Pinned to one connection so every query sees the same data.
    pub async fn create_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init(&self) -> Result<()> {
        schema::create_schema(&self.pool).await?;
        metrics::create_metrics_table(&self.pool).await
    }

    /// Ridings joined with their historical per-party results, ordered by riding id.
    pub async fn load_districts(&self, report: &mut LoadReport) -> Result<Vec<District>> {
        let ridings = sqlx::query_as::<_, RidingRow>(
            r#"
            SELECT id, province, name
            FROM ridings
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let results = sqlx::query_as::<_, DistrictResultRow>(
            r#"
            SELECT riding_id, party, vote_percentage, lean_vs_province, lean_vs_federal
            FROM district_results
            ORDER BY riding_id, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut districts: BTreeMap<i64, District> = ridings
            .into_iter()
            .map(|r| (r.id, District::new(r.id, r.province, r.name)))
            .collect();

        for row in results {
            let district = districts.get_mut(&row.riding_id).ok_or_else(|| {
                DatabaseError::Integrity(format!(
                    "result for {} references unknown riding {}",
                    row.party, row.riding_id
                ))
            })?;
            let party = match Party::from_str(&row.party) {
                Ok(party) => party,
                Err(_) => {
                    report.unknown(&row.party);
                    continue;
                }
            };
            // The party is dropped from this riding; the rest still load.
            let share = match row.vote_percentage {
                Some(share) => share,
                None => {
                    report.missing_share(row.riding_id, party);
                    continue;
                }
            };
            district.add_result(
                party,
                share,
                Lean {
                    vs_province: row.lean_vs_province,
                    vs_federal: row.lean_vs_federal,
                },
            );
        }

        // Ridings without any usable result cannot be projected.
        Ok(districts
            .into_values()
            .filter(|d| !d.baseline.is_empty())
            .collect())
    }

    pub async fn load_national_baseline(&self, report: &mut LoadReport) -> Result<NationalBaseline> {
        let rows = sqlx::query_as::<_, NationalResultRow>(
            "SELECT party, vote_percentage FROM national_results ORDER BY party",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut baseline = PartyMap::new();
        for row in rows {
            match Party::from_str(&row.party) {
                Ok(party) => {
                    baseline.insert(party, row.vote_percentage);
                }
                Err(_) => report.unknown(&row.party),
            }
        }
        Ok(baseline)
    }

    /// Polls for one region, newest first.
    pub async fn load_polls(&self, region: &str) -> Result<Vec<Poll>> {
        let rows = sqlx::query_as::<_, PollRow>(
            r#"
            SELECT region, last_date, firm, method, sample_size, error,
                   lpc, cpc, ndp, gpc, bq, other
            FROM polls
            WHERE region = ? COLLATE NOCASE
            ORDER BY last_date DESC, id
            "#,
        )
        .bind(region)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PollRow::into_poll).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RidingRow {
    id: i64,
    province: String,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct DistrictResultRow {
    riding_id: i64,
    party: String,
    vote_percentage: Option<f64>,
    lean_vs_province: Option<f64>,
    lean_vs_federal: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct NationalResultRow {
    party: String,
    vote_percentage: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct PollRow {
    region: String,
    last_date: String,
    firm: String,
    method: Option<String>,
    sample_size: Option<i64>,
    error: Option<f64>,
    lpc: Option<f64>,
    cpc: Option<f64>,
    ndp: Option<f64>,
    gpc: Option<f64>,
    bq: Option<f64>,
    other: Option<f64>,
}

impl PollRow {
    fn into_poll(self) -> Result<Poll> {
        let last_date = NaiveDate::parse_from_str(&self.last_date, "%Y-%m-%d").map_err(|e| {
            DatabaseError::Integrity(format!(
                "poll by {} has invalid date {:?}: {}",
                self.firm, self.last_date, e
            ))
        })?;
        let sample_size = u32::try_from(self.sample_size.unwrap_or(0).max(0)).unwrap_or(u32::MAX);

        let shares = [
            (Party::Lpc, self.lpc),
            (Party::Cpc, self.cpc),
            (Party::Ndp, self.ndp),
            (Party::Gpc, self.gpc),
            (Party::Bq, self.bq),
            (Party::Other, self.other),
        ]
        .into_iter()
        .filter_map(|(party, share)| share.map(|s| (party, s)))
        .collect();

        Ok(Poll {
            region: self.region,
            firm: self.firm,
            method: self.method,
            last_date,
            sample_size,
            error: self.error.unwrap_or(f64::NAN),
            shares,
        })
    }
}
