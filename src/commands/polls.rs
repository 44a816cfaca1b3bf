use super::{sqlite_url, CommandResult};
use crate::database::ForecastDatabase;
use crate::forecast::weighting::{weigh_polls, PollAverage};
use chrono::NaiveDate;
use colored::*;
use std::path::Path;

/// Print each poll's weight and the resulting national average.
pub async fn polls(database_path: &Path, reference: NaiveDate, region: &str) -> CommandResult {
    let db = ForecastDatabase::new(&sqlite_url(database_path)).await?;
    let polls = db.load_polls(region).await?;

    println!(
        "🗳️  {} {} polls weighted as of {}",
        polls.len().to_string().bright_yellow(),
        region.bright_cyan(),
        reference.to_string().bright_cyan()
    );

    for (poll, weight) in polls.iter().zip(weigh_polls(&polls, reference)) {
        let line = format!(
            "  {:<24} {}  n={:<6} age={:>3}d  weight={:.2}",
            poll.firm, poll.last_date, poll.sample_size, weight.age_days, weight.weight
        );
        if weight.weight > 0.0 {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }

    let average = PollAverage::compute(&polls, reference)?;
    println!("{}", "-".repeat(50).bright_cyan());
    for (party, share) in average.shares.iter() {
        println!(
            "  {:<6} {}",
            party.code().to_uppercase().bright_white().bold(),
            format!("{:.1}%", share).bright_green()
        );
    }
    println!(
        "  {} ±{:.1} ({} polls)",
        "Margin of error".bright_white().bold(),
        average.margin_of_error,
        average.polls_used
    );
    Ok(())
}
