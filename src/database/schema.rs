use crate::database::{DatabaseError, Result};
/// Input database schema definitions and integrity checks
use sqlx::SqlitePool;

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Create ridings table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ridings (
            id INTEGER PRIMARY KEY,
            province TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create district_results table (one row per candidate). riding_id is
    // checked at load time so each table can be re-imported on its own.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS district_results (
            id INTEGER PRIMARY KEY,
            riding_id INTEGER NOT NULL,
            year INTEGER,
            party TEXT NOT NULL,
            candidate TEXT,
            vote_count INTEGER,
            vote_percentage REAL,
            elected TEXT,
            incumbent TEXT,
            lean_vs_province REAL,
            lean_vs_federal REAL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create national_results table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS national_results (
            party TEXT PRIMARY KEY,
            vote_percentage REAL NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create polls table; a NULL share means the poll did not report that party
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS polls (
            id INTEGER PRIMARY KEY,
            region TEXT NOT NULL,
            last_date TEXT NOT NULL,
            firm TEXT NOT NULL,
            method TEXT,
            sample_size INTEGER,
            error REAL,
            lpc REAL,
            cpc REAL,
            ndp REAL,
            gpc REAL,
            bq REAL,
            other REAL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create raw_files table for tracking imported CSV files
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_files (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            kind TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            row_count INTEGER,
            processed_at TIMESTAMP,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(filename, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for performance
    create_indexes(pool).await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_district_results_riding ON district_results(riding_id)",
        "CREATE INDEX IF NOT EXISTS idx_polls_region_date ON polls(region, last_date)",
        "CREATE INDEX IF NOT EXISTS idx_raw_files_hash ON raw_files(file_hash)",
    ];

    for index_sql in indexes {
        sqlx::query(index_sql).execute(pool).await?;
    }

    Ok(())
}

/// Verify database schema integrity
pub async fn verify_schema(pool: &SqlitePool) -> Result<()> {
    // Check that all expected tables exist
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(pool)
            .await?;

    let expected_tables = vec![
        "district_results",
        "national_results",
        "polls",
        "raw_files",
        "ridings",
    ];

    for expected in &expected_tables {
        if !tables.iter().any(|name| name == expected) {
            return Err(DatabaseError::Integrity(format!(
                "Missing table: {}",
                expected
            )));
        }
    }

    Ok(())
}
