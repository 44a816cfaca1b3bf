/// CSV import into the input database
use crate::database::{DatabaseError, ForecastDatabase, Result};
use crate::util::hash_file;
use colored::*;
use instant::Instant;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sqlx::{Sqlite, Transaction};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Input table a CSV file feeds. Each import replaces the table's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Ridings,
    Results,
    National,
    Polls,
}

impl TableKind {
    fn table(self) -> &'static str {
        match self {
            TableKind::Ridings => "ridings",
            TableKind::Results => "district_results",
            TableKind::National => "national_results",
            TableKind::Polls => "polls",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Ridings => write!(f, "ridings"),
            TableKind::Results => write!(f, "results"),
            TableKind::National => write!(f, "national"),
            TableKind::Polls => write!(f, "polls"),
        }
    }
}

impl FromStr for TableKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ridings" => Ok(TableKind::Ridings),
            "results" => Ok(TableKind::Results),
            "national" => Ok(TableKind::National),
            "polls" => Ok(TableKind::Polls),
            other => Err(format!(
                "unknown table kind {:?} (expected ridings, results, national or polls)",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RidingRecord {
    id: i64,
    province: String,
    #[serde(alias = "riding")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResultRecord {
    #[serde(alias = "id")]
    riding_id: i64,
    year: Option<i64>,
    party: String,
    candidate: Option<String>,
    #[serde(alias = "votecount")]
    vote_count: Option<i64>,
    #[serde(alias = "votepercentage")]
    vote_percentage: Option<f64>,
    elected: Option<String>,
    incumbent: Option<String>,
    #[serde(alias = "leanvsprovince")]
    lean_vs_province: Option<f64>,
    #[serde(alias = "leanvsfederal")]
    lean_vs_federal: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NationalRecord {
    party: String,
    #[serde(alias = "votepercent", alias = "votepercent2019")]
    vote_percentage: f64,
}

#[derive(Debug, Deserialize)]
struct PollRecord {
    region: String,
    #[serde(alias = "lastdate")]
    last_date: String,
    firm: String,
    method: Option<String>,
    #[serde(alias = "sample")]
    sample_size: Option<i64>,
    error: Option<f64>,
    lpc: Option<f64>,
    cpc: Option<f64>,
    ndp: Option<f64>,
    gpc: Option<f64>,
    bq: Option<f64>,
    other: Option<f64>,
}

#[derive(Debug)]
pub struct IngestionSummary {
    pub filename: String,
    pub kind: TableKind,
    pub rows: u64,
    /// The file matched the last import and was left alone.
    pub unchanged: bool,
    pub duration_ms: u64,
}

pub struct CsvIngester {
    db: ForecastDatabase,
}

impl CsvIngester {
    pub fn new(db: ForecastDatabase) -> Self {
        Self { db }
    }

    /// Import one CSV file, replacing the contents of its table.
    pub async fn ingest_file(
        &self,
        path: &Path,
        kind: TableKind,
        force: bool,
    ) -> Result<IngestionSummary> {
        let start = Instant::now();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let file_hash = hash_file(path)?;

        if !force && self.is_unchanged(&filename, kind, &file_hash).await? {
            println!(
                "⏭️  {} unchanged since last import, skipping (use --force to reload)",
                filename.bright_cyan()
            );
            return Ok(IngestionSummary {
                filename,
                kind,
                rows: 0,
                unchanged: true,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        println!(
            "📥 Importing {} into {}",
            filename.bright_cyan(),
            kind.table().bright_yellow()
        );

        let mut tx = self.db.pool().begin().await?;
        sqlx::query(&format!("DELETE FROM {}", kind.table()))
            .execute(&mut *tx)
            .await?;

        let rows = match kind {
            TableKind::Ridings => {
                let records: Vec<RidingRecord> = read_records(path)?;
                insert_ridings(&mut tx, &records).await?
            }
            TableKind::Results => {
                let records: Vec<ResultRecord> = read_records(path)?;
                insert_results(&mut tx, &records).await?
            }
            TableKind::National => {
                let records: Vec<NationalRecord> = read_records(path)?;
                insert_national(&mut tx, &records).await?
            }
            TableKind::Polls => {
                let records: Vec<PollRecord> = read_records(path)?;
                insert_polls(&mut tx, &records).await?
            }
        };

        let rows_i64 = rows as i64;
        let processed_at = chrono::Utc::now().to_rfc3339();
        // Re-inserting moves this file to the newest id for its kind.
        sqlx::query("DELETE FROM raw_files WHERE filename = ? AND kind = ?")
            .bind(&filename)
            .bind(kind.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO raw_files (filename, kind, file_hash, row_count, processed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&filename)
        .bind(kind.to_string())
        .bind(&file_hash)
        .bind(rows_i64)
        .bind(processed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let summary = IngestionSummary {
            filename,
            kind,
            rows,
            unchanged: false,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        println!(
            "    ✅ Imported {} rows from {} in {} ms",
            summary.rows.to_string().bright_green(),
            summary.filename,
            summary.duration_ms
        );
        Ok(summary)
    }

    /// True when the table currently holds exactly this file: the latest
    /// import of `kind` had the same name and hash.
    async fn is_unchanged(&self, filename: &str, kind: TableKind, file_hash: &str) -> Result<bool> {
        let latest: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT filename, file_hash
            FROM raw_files
            WHERE kind = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(kind.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(matches!(latest, Some((name, hash)) if name == filename && hash == file_hash))
    }
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let mut records = Vec::new();
    for (index, record) in reader.deserialize().enumerate() {
        let record: T = record.map_err(|e| {
            DatabaseError::Integrity(format!(
                "{}: malformed row at line {}: {}",
                path.display(),
                index + 2,
                e
            ))
        })?;
        records.push(record);
    }
    Ok(records)
}

async fn insert_ridings(tx: &mut Transaction<'_, Sqlite>, records: &[RidingRecord]) -> Result<u64> {
    for record in records {
        sqlx::query("INSERT INTO ridings (id, province, name) VALUES (?, ?, ?)")
            .bind(record.id)
            .bind(&record.province)
            .bind(&record.name)
            .execute(&mut **tx)
            .await?;
    }
    Ok(records.len() as u64)
}

async fn insert_results(tx: &mut Transaction<'_, Sqlite>, records: &[ResultRecord]) -> Result<u64> {
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO district_results
            (riding_id, year, party, candidate, vote_count, vote_percentage,
             elected, incumbent, lean_vs_province, lean_vs_federal)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.riding_id)
        .bind(record.year)
        .bind(&record.party)
        .bind(&record.candidate)
        .bind(record.vote_count)
        .bind(record.vote_percentage)
        .bind(&record.elected)
        .bind(&record.incumbent)
        .bind(record.lean_vs_province)
        .bind(record.lean_vs_federal)
        .execute(&mut **tx)
        .await?;
    }
    Ok(records.len() as u64)
}

async fn insert_national(tx: &mut Transaction<'_, Sqlite>, records: &[NationalRecord]) -> Result<u64> {
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO national_results (party, vote_percentage) VALUES (?, ?)
            ON CONFLICT(party) DO UPDATE SET vote_percentage = excluded.vote_percentage
            "#,
        )
        .bind(record.party.to_lowercase())
        .bind(record.vote_percentage)
        .execute(&mut **tx)
        .await?;
    }
    Ok(records.len() as u64)
}

async fn insert_polls(tx: &mut Transaction<'_, Sqlite>, records: &[PollRecord]) -> Result<u64> {
    for (index, record) in records.iter().enumerate() {
        // Reject bad dates here rather than at forecast time.
        if chrono::NaiveDate::parse_from_str(&record.last_date, "%Y-%m-%d").is_err() {
            return Err(DatabaseError::Integrity(format!(
                "poll at line {} has invalid date {:?} (expected YYYY-MM-DD)",
                index + 2,
                record.last_date
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO polls
            (region, last_date, firm, method, sample_size, error, lpc, cpc, ndp, gpc, bq, other)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.region)
        .bind(&record.last_date)
        .bind(&record.firm)
        .bind(&record.method)
        .bind(record.sample_size)
        .bind(record.error)
        .bind(record.lpc)
        .bind(record.cpc)
        .bind(record.ndp)
        .bind(record.gpc)
        .bind(record.bq)
        .bind(record.other)
        .execute(&mut **tx)
        .await?;
    }
    Ok(records.len() as u64)
}
