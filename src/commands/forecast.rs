use super::{sqlite_url, CommandResult};
use crate::database::metrics::{MetricsCollector, RunStage};
use crate::database::{ForecastDatabase, LoadReport};
use crate::forecast::{ForecastConfig, ForecastInputs, ForecastSummary, Simulation};
use crate::reports::export::export_forecast;
use crate::reports::ReportsDatabase;
use chrono::NaiveDate;
use colored::*;
use std::path::PathBuf;

pub struct ForecastOptions {
    pub database_path: PathBuf,
    pub out_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub trials: Option<u32>,
    pub seed: Option<u64>,
    pub date: Option<NaiveDate>,
    pub region: Option<String>,
    pub sequential: bool,
    pub reports_db_path: Option<PathBuf>,
    pub quiet: bool,
}

impl ForecastOptions {
    /// File config (or defaults) with command-line overrides applied.
    fn resolve_config(&self) -> Result<ForecastConfig, crate::forecast::ForecastError> {
        let mut config = match &self.config_path {
            Some(path) => ForecastConfig::from_file(path)?,
            None => ForecastConfig::default(),
        };
        if let Some(trials) = self.trials {
            config.trials = trials;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.date.is_some() {
            config.reference_date = self.date;
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if self.sequential {
            config.parallel = false;
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn forecast(options: &ForecastOptions) -> CommandResult {
    let config = options.resolve_config()?;

    println!(
        "🚀 Forecasting from {} ({} trials)",
        options.database_path.display().to_string().bright_cyan(),
        config.trials.to_string().bright_yellow()
    );

    let db = ForecastDatabase::new(&sqlite_url(&options.database_path)).await?;
    db.init().await?;
    let run_label = format!("forecast-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"));
    let mut metrics = MetricsCollector::new(db.pool().clone(), run_label.clone());
    metrics.start_stage(RunStage::Complete);

    // Step 1: Load inputs once
    metrics.start_stage(RunStage::Loading);
    let mut load_report = LoadReport::default();
    let inputs = ForecastInputs {
        districts: db.load_districts(&mut load_report).await?,
        national: db.load_national_baseline(&mut load_report).await?,
        polls: db.load_polls(&config.region).await?,
    };
    let rows = (inputs.districts.len() + inputs.national.len() + inputs.polls.len()) as u64;
    metrics.end_stage(RunStage::Loading, Some(rows)).await?;

    println!(
        "📋 Loaded {} ridings, {} national results, {} polls",
        inputs.districts.len().to_string().bright_yellow(),
        inputs.national.len().to_string().bright_yellow(),
        inputs.polls.len().to_string().bright_yellow()
    );
    for (label, count) in &load_report.unknown_parties {
        eprintln!(
            "⚠️  Skipped {} rows with untracked party {:?}",
            count.to_string().yellow(),
            label
        );
    }
    if !load_report.missing_shares.is_empty() {
        let rows: usize = load_report.missing_shares.values().sum();
        eprintln!(
            "⚠️  Skipped {} result rows without a vote percentage",
            rows.to_string().yellow()
        );
        for ((riding_id, party), count) in load_report.missing_shares.iter().take(10) {
            eprintln!("    riding {} {}: {} rows", riding_id, party, count);
        }
    }

    // Step 2: Weight polls
    metrics.start_stage(RunStage::Weighting);
    let simulation = Simulation::new(&inputs, config)?;
    metrics
        .end_stage(RunStage::Weighting, Some(simulation.poll_average().polls_used as u64))
        .await?;
    print_poll_average(&simulation);

    // Step 3: Simulate
    let mode = if simulation.config().parallel { "parallel" } else { "sequential" };
    println!(
        "🎲 Simulating {} elections ({}, seed {})",
        simulation.config().trials.to_string().bright_yellow(),
        mode,
        simulation.seed()
    );
    metrics.start_stage(RunStage::Simulation);
    let quiet = options.quiet;
    let aggregate = simulation.run_with_progress(|done, total| {
        if !quiet {
            println!("  🎲 Simulated {}/{} elections", done, total);
        }
    });
    metrics
        .end_stage(RunStage::Simulation, Some(aggregate.trials as u64))
        .await?;

    // Step 4: Summarize
    metrics.start_stage(RunStage::Summary);
    let summary =
        ForecastSummary::from_aggregate(&aggregate, simulation.poll_average(), simulation.seed());
    metrics
        .end_stage(RunStage::Summary, Some(summary.district_probabilities.len() as u64))
        .await?;
    print_national_summary(&summary);
    print_issues(&summary);

    // Step 5: Export
    metrics.start_stage(RunStage::Export);
    let files = export_forecast(&options.out_dir, &summary)?;
    for file in &files {
        println!("💾 Wrote {}", file.display().to_string().bright_green());
    }
    if let Some(reports_path) = &options.reports_db_path {
        let reports = ReportsDatabase::new(&sqlite_url(reports_path)).await?;
        let run_id = reports.insert_forecast(&summary).await?;
        println!(
            "💾 Stored run {} in {}",
            run_id.to_string().bright_yellow(),
            reports_path.display().to_string().bright_green()
        );
    }
    metrics.end_stage(RunStage::Export, Some(files.len() as u64)).await?;

    metrics.end_stage(RunStage::Complete, Some(aggregate.trials as u64)).await?;
    if !quiet {
        let recorded = metrics.get_run_metrics(&run_label).await?;
        metrics.print_summary(&recorded);
    }

    println!("✅ Forecast complete (seed {})", simulation.seed().to_string().bright_yellow());
    Ok(())
}

fn print_poll_average(simulation: &Simulation<'_>) {
    let average = simulation.poll_average();
    println!(
        "🗳️  Weighted {} polls as of {} (margin of error ±{:.1})",
        average.polls_used.to_string().bright_yellow(),
        average.reference_date.to_string().bright_cyan(),
        average.margin_of_error
    );
    let line = average
        .shares
        .iter()
        .map(|(party, share)| format!("{} {:.1}", party.code().to_uppercase(), share))
        .collect::<Vec<_>>()
        .join("  ");
    println!("   {}", line.bright_white());
}

fn print_national_summary(summary: &ForecastSummary) {
    println!("\n{}", "🏛️  Seat Projection".bright_cyan().bold());
    println!("{}", "=".repeat(50).bright_cyan());
    println!(
        "{:<8} {:>6} {:>8} {:>6} {:>12}",
        "Party", "Min", "Mean", "Max", "Most seats"
    );
    for stats in summary.ranking() {
        println!(
            "{:<8} {:>6} {:>8} {:>6} {:>11}%",
            stats.party.code().to_uppercase().bright_white().bold(),
            stats.min_seats,
            format!("{:.0}", stats.mean_seats).bright_green(),
            stats.max_seats,
            format!("{:.1}", stats.most_seats_pct)
        );
    }
    println!();
}

fn print_issues(summary: &ForecastSummary) {
    let issues = &summary.issues;
    if issues.missing_party_data == 0 && issues.degenerate_normalizations == 0 {
        return;
    }

    eprintln!("{}", "⚠️  Recoverable issues".yellow().bold());
    if issues.missing_party_data > 0 {
        eprintln!(
            "  {} party projections skipped across {} riding/party pairs",
            issues.missing_party_data.to_string().yellow(),
            issues.skipped_parties.len().to_string().yellow()
        );
        for skipped in issues.skipped_parties.iter().take(10) {
            eprintln!(
                "    riding {} {}: {}",
                skipped.district_id, skipped.party, skipped.reason
            );
        }
        if issues.skipped_parties.len() > 10 {
            eprintln!("    ... and {} more", issues.skipped_parties.len() - 10);
        }
    }
    if issues.degenerate_normalizations > 0 {
        eprintln!(
            "  {} riding results had no positive share and were left undecided",
            issues.degenerate_normalizations.to_string().yellow()
        );
        for (district_id, trials) in issues.degenerate_districts.iter().take(10) {
            eprintln!("    riding {}: {} trials", district_id, trials);
        }
    }
}
