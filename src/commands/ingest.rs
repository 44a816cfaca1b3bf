use super::{sqlite_url, CommandResult};
use crate::database::ingestion::{CsvIngester, TableKind};
use crate::database::schema::verify_schema;
use crate::database::ForecastDatabase;
use colored::*;
use std::path::Path;

pub async fn init(database_path: &Path) -> CommandResult {
    let db = ForecastDatabase::new(&sqlite_url(database_path)).await?;
    db.init().await?;
    verify_schema(db.pool()).await?;

    println!(
        "✅ Database initialized: {}",
        database_path.display().to_string().bright_green()
    );
    Ok(())
}

pub async fn ingest(database_path: &Path, kind: TableKind, csv_path: &Path, force: bool) -> CommandResult {
    if !csv_path.exists() {
        return Err(format!("CSV file does not exist: {}", csv_path.display()).into());
    }

    let db = ForecastDatabase::new(&sqlite_url(database_path)).await?;
    db.init().await?;

    let ingester = CsvIngester::new(db);
    let summary = ingester.ingest_file(csv_path, kind, force).await?;

    if !summary.unchanged {
        println!(
            "🎉 {} table now holds {} rows",
            summary.kind.to_string().bright_cyan(),
            summary.rows.to_string().bright_yellow()
        );
    }
    Ok(())
}
