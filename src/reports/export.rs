use super::ReportResult;
use crate::forecast::summary::ForecastSummary;
use crate::model::Party;
use crate::util::{round_to, write_serialized};
use std::fs;
use std::path::{Path, PathBuf};

pub const RIDING_PROBABILITIES: &str = "riding_probabilities.csv";
pub const SEAT_COUNTS: &str = "seat_counts.csv";
pub const SEAT_STATS: &str = "seat_stats.csv";
pub const RIDING_VOTE_SHARES: &str = "riding_vote_shares.csv";
pub const SUMMARY_JSON: &str = "forecast_summary.json";

/// Write every output table into `out_dir`, returning the files written.
pub fn export_forecast(out_dir: &Path, summary: &ForecastSummary) -> ReportResult<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;

    let files = vec![
        write_riding_probabilities(&out_dir.join(RIDING_PROBABILITIES), summary)?,
        write_seat_counts(&out_dir.join(SEAT_COUNTS), summary)?,
        write_seat_stats(&out_dir.join(SEAT_STATS), summary)?,
        write_riding_vote_shares(&out_dir.join(RIDING_VOTE_SHARES), summary)?,
    ];

    let summary_path = out_dir.join(SUMMARY_JSON);
    write_serialized(&summary_path, summary)?;

    Ok(files.into_iter().chain(std::iter::once(summary_path)).collect())
}

fn party_header(first: &str) -> Vec<String> {
    std::iter::once(first.to_string())
        .chain(Party::ALL.iter().map(|p| p.code().to_string()))
        .collect()
}

fn write_riding_probabilities(path: &Path, summary: &ForecastSummary) -> ReportResult<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(party_header("district_id"))?;
    for row in &summary.district_probabilities {
        let mut record = vec![row.district_id.to_string()];
        record.extend(Party::ALL.iter().map(|&party| {
            format!("{:.1}", row.probabilities.get(party).copied().unwrap_or(0.0))
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

fn write_seat_counts(path: &Path, summary: &ForecastSummary) -> ReportResult<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(party_header("trial"))?;
    for (trial, seats) in summary.seat_counts.iter().enumerate() {
        let mut record = vec![(trial + 1).to_string()];
        record.extend(seats.iter().map(|s| s.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

fn write_seat_stats(path: &Path, summary: &ForecastSummary) -> ReportResult<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["party", "min_seats", "mean_seats", "max_seats", "most_seats_pct"])?;
    for stats in &summary.seat_stats {
        writer.write_record([
            stats.party.code().to_string(),
            stats.min_seats.to_string(),
            format!("{:.0}", round_to(stats.mean_seats, 0)),
            stats.max_seats.to_string(),
            format!("{:.1}", stats.most_seats_pct),
        ])?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

fn write_riding_vote_shares(path: &Path, summary: &ForecastSummary) -> ReportResult<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = party_header("district_id");
    header.extend(Party::ALL.iter().map(|p| format!("{}_std", p.code())));
    writer.write_record(&header)?;

    for row in &summary.district_vote_shares {
        let mut record = vec![row.district_id.to_string()];
        record.extend(
            Party::ALL
                .iter()
                .map(|&party| format!("{:.1}", row.mean.get(party).copied().unwrap_or(0.0))),
        );
        record.extend(
            Party::ALL
                .iter()
                .map(|&party| format!("{:.1}", row.dispersion.get(party).copied().unwrap_or(0.0))),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}
