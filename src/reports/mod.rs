use crate::database::DatabaseError;
use crate::forecast::summary::{DistrictProbabilities, ForecastSummary};
use crate::model::{Party, PartyMap};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub mod export;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No data found: {0}")]
    NoData(String),
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Database holding finished forecast runs
pub struct ReportsDatabase {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ForecastRunInfo {
    pub id: i64,
    pub reference_date: String,
    pub trials: i64,
    pub seed: String,
    pub margin_of_error: f64,
}

impl ReportsDatabase {
    pub async fn new(database_url: &str) -> ReportResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::migrate(pool).await
    }

    pub async fn create_in_memory() -> ReportResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> ReportResult<Self> {
        // Run reports migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ReportError::Database(DatabaseError::Migration(e.to_string())))?;

        Ok(Self { pool })
    }

    /// Store a finished run; returns its id.
    pub async fn insert_forecast(&self, summary: &ForecastSummary) -> ReportResult<i64> {
        let summary_json = serde_json::to_string(summary)?;
        let mut tx = self.pool.begin().await?;

        let run_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO forecast_runs (reference_date, trials, seed, margin_of_error, summary_json)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(summary.run.reference_date.format("%Y-%m-%d").to_string())
        .bind(summary.run.trials as i64)
        .bind(summary.run.seed.to_string())
        .bind(summary.run.margin_of_error)
        .bind(summary_json)
        .fetch_one(&mut *tx)
        .await?;

        for row in &summary.district_probabilities {
            let p = |party: Party| row.probabilities.get(party).copied().unwrap_or(0.0);
            sqlx::query(
                r#"
                INSERT INTO riding_probabilities (run_id, riding_id, lpc, cpc, ndp, gpc, bq, other)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run_id)
            .bind(row.district_id)
            .bind(p(Party::Lpc))
            .bind(p(Party::Cpc))
            .bind(p(Party::Ndp))
            .bind(p(Party::Gpc))
            .bind(p(Party::Bq))
            .bind(p(Party::Other))
            .execute(&mut *tx)
            .await?;
        }

        for stats in &summary.seat_stats {
            sqlx::query(
                r#"
                INSERT INTO seat_stats (run_id, party, min_seats, mean_seats, max_seats, most_seats_pct)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(run_id)
            .bind(stats.party.code())
            .bind(stats.min_seats as i64)
            .bind(stats.mean_seats)
            .bind(stats.max_seats as i64)
            .bind(stats.most_seats_pct)
            .execute(&mut *tx)
            .await?;
        }

        for shares in &summary.district_vote_shares {
            for party in Party::ALL {
                sqlx::query(
                    r#"
                    INSERT INTO riding_vote_shares (run_id, riding_id, party, mean_share, dispersion)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(run_id)
                .bind(shares.district_id)
                .bind(party.code())
                .bind(shares.mean.get(party).copied().unwrap_or(0.0))
                .bind(shares.dispersion.get(party).copied().unwrap_or(0.0))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(run_id)
    }

    pub async fn latest_run(&self) -> ReportResult<ForecastRunInfo> {
        sqlx::query_as::<_, ForecastRunInfo>(
            r#"
            SELECT id, reference_date, trials, seed, margin_of_error
            FROM forecast_runs
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ReportError::NoData("no forecast runs stored".to_string()))
    }

    pub async fn get_riding_probabilities(&self, run_id: i64) -> ReportResult<Vec<DistrictProbabilities>> {
        let rows: Vec<(i64, f64, f64, f64, f64, f64, f64)> = sqlx::query_as(
            r#"
            SELECT riding_id, lpc, cpc, ndp, gpc, bq, other
            FROM riding_probabilities
            WHERE run_id = ?
            ORDER BY riding_id
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(ReportError::NoData(format!("run {}", run_id)));
        }

        Ok(rows
            .into_iter()
            .map(|(district_id, lpc, cpc, ndp, gpc, bq, other)| DistrictProbabilities {
                district_id,
                probabilities: [lpc, cpc, ndp, gpc, bq, other]
                    .into_iter()
                    .zip(Party::ALL)
                    .map(|(value, party)| (party, value))
                    .collect::<PartyMap<f64>>(),
            })
            .collect())
    }

    /// Full summary JSON of a stored run.
    pub async fn get_forecast_summary(&self, run_id: i64) -> ReportResult<ForecastSummary> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT summary_json FROM forecast_runs WHERE id = ?")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(ReportError::NoData(format!("run {}", run_id))),
        }
    }
}
