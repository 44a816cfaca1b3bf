use super::aggregate::{AggregateResult, IssueCounts};
use super::weighting::PollAverage;
use crate::model::{Party, PartyCounts, PartyMap};
use crate::util::round_to;
use chrono::NaiveDate;
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};

/// Degrees of freedom removed when computing vote-share dispersion.
pub const DISPERSION_DDOF: u64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictProbabilities {
    pub district_id: i64,
    /// Win probability in percent, one decimal, for every party.
    pub probabilities: PartyMap<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatStats {
    pub party: Party,
    pub min_seats: u32,
    pub mean_seats: f64,
    pub max_seats: u32,
    /// Share of trials in which the party won the most seats, in percent.
    pub most_seats_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictVoteShare {
    pub district_id: i64,
    pub mean: PartyMap<f64>,
    /// Two standard deviations of the simulated share.
    pub dispersion: PartyMap<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedParty {
    pub district_id: i64,
    pub party: Party,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueSummary {
    pub missing_party_data: u64,
    pub degenerate_normalizations: u64,
    pub skipped_parties: Vec<SkippedParty>,
    pub degenerate_districts: Vec<(i64, u32)>,
}

impl From<&IssueCounts> for IssueSummary {
    fn from(counts: &IssueCounts) -> Self {
        Self {
            missing_party_data: counts.missing_party_data,
            degenerate_normalizations: counts.degenerate_normalizations,
            skipped_parties: counts
                .skipped_parties
                .iter()
                .map(|(&(district_id, party), reason)| SkippedParty {
                    district_id,
                    party,
                    reason: reason.to_string(),
                })
                .collect(),
            degenerate_districts: counts
                .degenerate_districts
                .iter()
                .map(|(&id, &trials)| (id, trials))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub trials: u32,
    pub seed: u64,
    pub reference_date: NaiveDate,
    pub polls_used: usize,
    pub margin_of_error: f64,
    pub poll_average: PartyMap<f64>,
    pub district_count: usize,
}

/// Exportable view of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub run: RunInfo,
    pub district_probabilities: Vec<DistrictProbabilities>,
    pub seat_stats: Vec<SeatStats>,
    pub district_vote_shares: Vec<DistrictVoteShare>,
    #[serde(skip)]
    pub seat_counts: Vec<PartyCounts>,
    pub issues: IssueSummary,
}

impl ForecastSummary {
    pub fn from_aggregate(aggregate: &AggregateResult, poll_average: &PollAverage, seed: u64) -> Self {
        let trials = aggregate.trials;

        let district_probabilities = aggregate
            .district_ids
            .iter()
            .zip(&aggregate.win_counts)
            .map(|(&district_id, counts)| DistrictProbabilities {
                district_id,
                probabilities: win_probabilities(counts, trials),
            })
            .collect();

        let district_vote_shares = aggregate
            .district_ids
            .iter()
            .zip(&aggregate.vote_shares)
            .map(|(&district_id, samples)| DistrictVoteShare {
                district_id,
                mean: Party::ALL
                    .iter()
                    .map(|&party| {
                        let mean = samples.get(party).and_then(|s| s.mean()).unwrap_or(0.0);
                        (party, round_to(mean, 1))
                    })
                    .collect(),
                dispersion: Party::ALL
                    .iter()
                    .map(|&party| {
                        let sd = samples
                            .get(party)
                            .and_then(|s| s.std_dev(DISPERSION_DDOF))
                            .unwrap_or(0.0);
                        (party, round_to(sd * 2.0, 1))
                    })
                    .collect(),
            })
            .collect();

        Self {
            run: RunInfo {
                trials,
                seed,
                reference_date: poll_average.reference_date,
                polls_used: poll_average.polls_used,
                margin_of_error: poll_average.margin_of_error,
                poll_average: poll_average.shares.clone(),
                district_count: aggregate.district_count(),
            },
            district_probabilities,
            seat_stats: seat_stats(aggregate),
            district_vote_shares,
            seat_counts: aggregate.seat_tallies.clone(),
            issues: IssueSummary::from(&aggregate.issues),
        }
    }

    /// Parties ordered by mean seats, most first.
    pub fn ranking(&self) -> Vec<&SeatStats> {
        self.seat_stats
            .iter()
            .sorted_by(|a, b| {
                b.mean_seats
                    .partial_cmp(&a.mean_seats)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .collect()
    }
}

fn seat_stats(aggregate: &AggregateResult) -> Vec<SeatStats> {
    let trials = aggregate.trials.max(1) as f64;
    Party::ALL
        .iter()
        .map(|&party| {
            let seats = aggregate.seat_tallies.iter().map(|tally| tally[party.index()]);
            let (min_seats, max_seats) = match seats.clone().minmax() {
                MinMaxResult::NoElements => (0, 0),
                MinMaxResult::OneElement(only) => (only, only),
                MinMaxResult::MinMax(min, max) => (min, max),
            };
            let mean_seats = seats.map(f64::from).sum::<f64>() / trials;
            SeatStats {
                party,
                min_seats,
                mean_seats,
                max_seats,
                most_seats_pct: round_to(
                    aggregate.most_seats[party.index()] as f64 / trials * 100.0,
                    1,
                ),
            }
        })
        .collect()
}

/// `count / trials * 100` in tenths of a percent, apportioned by largest
/// remainder so a riding decided in every trial sums to exactly 100.
pub fn win_probabilities(counts: &PartyCounts, trials: u32) -> PartyMap<f64> {
    if trials == 0 {
        return Party::ALL.iter().map(|&party| (party, 0.0)).collect();
    }
    let trials = trials as u64;
    let scaled: Vec<u64> = counts.iter().map(|&c| c as u64 * 1000).collect();
    let mut tenths: Vec<u64> = scaled.iter().map(|s| s / trials).collect();

    let decided: u64 = counts.iter().map(|&c| c as u64).sum();
    let target = (decided * 1000 + trials / 2) / trials;
    let floor_total: u64 = tenths.iter().sum();
    let extra = target.saturating_sub(floor_total) as usize;

    let by_remainder: Vec<usize> = (0..Party::COUNT)
        .filter(|&i| scaled[i] % trials > 0)
        .sorted_by(|&a, &b| (scaled[b] % trials).cmp(&(scaled[a] % trials)).then(a.cmp(&b)))
        .collect();
    for &index in by_remainder.iter().take(extra) {
        tenths[index] += 1;
    }

    Party::ALL
        .iter()
        .map(|&party| (party, tenths[party.index()] as f64 / 10.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::aggregate::TrialOutcome;
    use crate::forecast::projection::DistrictOutcome;

    fn tenths_total(map: &PartyMap<f64>) -> i64 {
        map.values().map(|v| (v * 10.0).round() as i64).sum()
    }

    #[test]
    fn probabilities_round_to_one_decimal() {
        let probabilities = win_probabilities(&[667, 333, 0, 0, 0, 0], 1000);
        assert_eq!(probabilities.get(Party::Lpc), Some(&66.7));
        assert_eq!(probabilities.get(Party::Cpc), Some(&33.3));
        assert_eq!(probabilities.get(Party::Bq), Some(&0.0));
    }

    #[test]
    fn probabilities_always_total_one_hundred() {
        for counts in [[1, 1, 1, 0, 0, 0], [1, 1, 1, 1, 1, 1], [5, 3, 2, 1, 1, 1], [7, 0, 0, 0, 0, 0]] {
            let trials = counts.iter().sum::<u32>();
            assert_eq!(tenths_total(&win_probabilities(&counts, trials)), 1000);
        }
    }

    #[test]
    fn excluded_trials_lower_the_row_total() {
        // 2 of 10 trials were degenerate for this riding.
        let probabilities = win_probabilities(&[5, 3, 0, 0, 0, 0], 10);
        assert_eq!(tenths_total(&probabilities), 800);
    }

    #[test]
    fn summary_has_a_stable_schema() {
        let mut aggregate = AggregateResult::new(vec![7]);
        for trial in 0..6 {
            let lpc = 50.0 + trial as f64;
            aggregate.record(&TrialOutcome {
                trial,
                districts: vec![DistrictOutcome {
                    district_id: 7,
                    shares: vec![(Party::Lpc, lpc), (Party::Ndp, 100.0 - lpc)].into_iter().collect(),
                    winner: Some(Party::Lpc),
                    issues: Vec::new(),
                }],
            });
        }
        let average = PollAverage {
            reference_date: NaiveDate::from_ymd_opt(2021, 4, 18).unwrap(),
            shares: PartyMap::new(),
            margin_of_error: 2.5,
            polls_used: 3,
        };
        let summary = ForecastSummary::from_aggregate(&aggregate, &average, 99);

        let shares = &summary.district_vote_shares[0];
        assert_eq!(shares.mean.len(), Party::COUNT);
        assert_eq!(shares.mean.get(Party::Lpc), Some(&52.5));
        assert_eq!(shares.mean.get(Party::Bq), Some(&0.0));
        // values 50..=55: sum of squares 17.5, ddof 4 -> sqrt(17.5 / 2) * 2
        assert_eq!(shares.dispersion.get(Party::Lpc), Some(&round_to((17.5f64 / 2.0).sqrt() * 2.0, 1)));
        assert_eq!(shares.dispersion.get(Party::Gpc), Some(&0.0));

        let lpc = &summary.seat_stats[Party::Lpc.index()];
        assert_eq!((lpc.min_seats, lpc.max_seats), (1, 1));
        assert_eq!(lpc.mean_seats, 1.0);
        assert_eq!(lpc.most_seats_pct, 100.0);
        assert_eq!(summary.ranking()[0].party, Party::Lpc);
        assert_eq!(summary.district_probabilities[0].probabilities.get(Party::Lpc), Some(&100.0));
        assert_eq!(summary.run.seed, 99);
    }
}
