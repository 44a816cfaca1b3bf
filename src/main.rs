use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use riding_forecast::commands::{forecast, ingest, init, polls, ForecastOptions};
use riding_forecast::database::ingestion::TableKind;
use std::path::PathBuf;

#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the input database schema
    Init {
        /// SQLite database path
        database_path: PathBuf,
    },
    /// Import a CSV file into one of the input tables
    Ingest {
        /// SQLite database path
        database_path: PathBuf,
        /// Target table: ridings, results, national or polls
        kind: TableKind,
        /// CSV file to import
        csv_path: PathBuf,
        /// Re-import even if the file has not changed
        #[clap(long)]
        force: bool,
    },
    /// Show poll weights and the weighted national average
    Polls {
        /// SQLite database path
        database_path: PathBuf,
        /// Reference date (YYYY-MM-DD), defaults to today
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Poll region to use
        #[clap(long, default_value = "National")]
        region: String,
    },
    /// Run the Monte Carlo forecast and export the results
    Forecast {
        /// SQLite database path
        database_path: PathBuf,
        /// Output directory for CSV and JSON files
        out_dir: PathBuf,
        /// JSON configuration file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Number of simulated elections
        #[clap(long)]
        trials: Option<u32>,
        /// Base random seed
        #[clap(long)]
        seed: Option<u64>,
        /// Reference date (YYYY-MM-DD) for poll ages
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Poll region to use
        #[clap(long)]
        region: Option<String>,
        /// Run every trial on the current thread
        #[clap(long)]
        sequential: bool,
        /// Also store the run in this reports database
        #[clap(long)]
        reports_db: Option<PathBuf>,
        /// Suppress progress output
        #[clap(long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    match opts.command {
        Command::Init { database_path } => {
            if let Err(e) = init(&database_path).await {
                eprintln!("❌ Initialization failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Ingest {
            database_path,
            kind,
            csv_path,
            force,
        } => {
            if let Err(e) = ingest(&database_path, kind, &csv_path, force).await {
                eprintln!("❌ Ingestion failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Polls {
            database_path,
            date,
            region,
        } => {
            let reference = date.unwrap_or_else(|| Local::now().date_naive());
            if let Err(e) = polls(&database_path, reference, &region).await {
                eprintln!("❌ Poll weighting failed: {}", e);
                std::process::exit(1);
            }
        }
        Command::Forecast {
            database_path,
            out_dir,
            config,
            trials,
            seed,
            date,
            region,
            sequential,
            reports_db,
            quiet,
        } => {
            let options = ForecastOptions {
                database_path,
                out_dir,
                config_path: config,
                trials,
                seed,
                date,
                region,
                sequential,
                reports_db_path: reports_db,
                quiet,
            };
            if let Err(e) = forecast(&options).await {
                eprintln!("❌ Forecast failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}
