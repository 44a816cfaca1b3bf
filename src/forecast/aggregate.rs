use super::projection::DistrictOutcome;
use super::{DistrictIssue, MissingReason};
use crate::model::{plurality, Party, PartyCounts, PartyMap};
use std::collections::BTreeMap;

/// Every riding's outcome for one simulated election.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub trial: u32,
    pub districts: Vec<DistrictOutcome>,
}

impl TrialOutcome {
    /// Seats won per party in this trial.
    pub fn seat_tally(&self) -> PartyCounts {
        let mut seats = [0; Party::COUNT];
        for winner in self.districts.iter().filter_map(|d| d.winner) {
            seats[winner.index()] += 1;
        }
        seats
    }
}

/// Running count, mean and sum of squared deviations (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean)
        }
    }

    /// Standard deviation with `ddof` delta degrees of freedom; `None` when `count <= ddof`.
    pub fn std_dev(&self, ddof: u64) -> Option<f64> {
        if self.count <= ddof {
            return None;
        }
        Some((self.m2 / (self.count - ddof) as f64).sqrt())
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueCounts {
    pub missing_party_data: u64,
    pub degenerate_normalizations: u64,
    /// Distinct (riding, party) pairs dropped at least once.
    pub skipped_parties: BTreeMap<(i64, Party), MissingReason>,
    /// Ridings with at least one degenerate trial, with the number of such trials.
    pub degenerate_districts: BTreeMap<i64, u32>,
}

/// Tallies accumulated across trials. Ridings are stored in input order.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub district_ids: Vec<i64>,
    pub trials: u32,
    /// Per riding: trials won by each party.
    pub win_counts: Vec<PartyCounts>,
    /// Per riding: running statistics of each party's normalized share.
    pub vote_shares: Vec<PartyMap<RunningStats>>,
    /// Per trial: seats won by each party.
    pub seat_tallies: Vec<PartyCounts>,
    /// Trials in which each party won the most seats.
    pub most_seats: PartyCounts,
    pub issues: IssueCounts,
}

impl AggregateResult {
    pub fn new(district_ids: Vec<i64>) -> Self {
        let n = district_ids.len();
        Self {
            district_ids,
            trials: 0,
            win_counts: vec![[0; Party::COUNT]; n],
            vote_shares: vec![PartyMap::new(); n],
            seat_tallies: Vec::new(),
            most_seats: [0; Party::COUNT],
            issues: IssueCounts::default(),
        }
    }

    /// Fold one trial in. Outcomes must be in the same riding order as `district_ids`.
    pub fn record(&mut self, outcome: &TrialOutcome) {
        debug_assert_eq!(outcome.districts.len(), self.district_ids.len());

        for (index, district) in outcome.districts.iter().enumerate() {
            debug_assert_eq!(district.district_id, self.district_ids[index]);
            self.record_issues(district);

            if let Some(winner) = district.winner {
                self.win_counts[index][winner.index()] += 1;
                let samples = &mut self.vote_shares[index];
                for (party, &share) in district.shares.iter() {
                    if let Some(stats) = samples.get_mut(party) {
                        stats.push(share);
                    } else {
                        let mut stats = RunningStats::default();
                        stats.push(share);
                        samples.insert(party, stats);
                    }
                }
            }
        }

        let seats = outcome.seat_tally();
        if let Some(leader) = plurality(&seats) {
            self.most_seats[leader.index()] += 1;
        }
        self.seat_tallies.push(seats);
        self.trials += 1;
    }

    fn record_issues(&mut self, district: &DistrictOutcome) {
        for issue in &district.issues {
            match *issue {
                DistrictIssue::MissingPartyData { party, reason } => {
                    self.issues.missing_party_data += 1;
                    self.issues
                        .skipped_parties
                        .entry((district.district_id, party))
                        .or_insert(reason);
                }
                DistrictIssue::DegenerateNormalization => {
                    self.issues.degenerate_normalizations += 1;
                    *self
                        .issues
                        .degenerate_districts
                        .entry(district.district_id)
                        .or_insert(0) += 1;
                }
            }
        }
    }

    pub fn district_count(&self) -> usize {
        self.district_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: i64, winner: Option<Party>, shares: &[(Party, f64)]) -> DistrictOutcome {
        let mut issues = Vec::new();
        if winner.is_none() {
            issues.push(DistrictIssue::DegenerateNormalization);
        }
        DistrictOutcome {
            district_id: id,
            shares: shares.iter().copied().collect(),
            winner,
            issues,
        }
    }

    #[test]
    fn running_stats_match_direct_computation() {
        let values = [50.0, 52.5, 47.0, 49.0, 55.5, 51.0, 46.5];
        let mut stats = RunningStats::default();
        values.iter().for_each(|v| stats.push(*v));

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();

        assert!((stats.mean().unwrap() - mean).abs() < 1e-12);
        assert!((stats.std_dev(4).unwrap() - (ss / (n - 4.0)).sqrt()).abs() < 1e-12);
        assert!((stats.std_dev(1).unwrap() - (ss / (n - 1.0)).sqrt()).abs() < 1e-12);
        assert_eq!(stats.count(), 7);
    }

    #[test]
    fn too_few_samples_have_no_dispersion() {
        let mut stats = RunningStats::default();
        assert_eq!(stats.mean(), None);
        for v in [1.0, 2.0, 3.0, 4.0] {
            stats.push(v);
        }
        assert_eq!(stats.std_dev(4), None);
    }

    #[test]
    fn records_wins_seats_and_pluralities() {
        let mut aggregate = AggregateResult::new(vec![10, 20, 30]);
        aggregate.record(&TrialOutcome {
            trial: 0,
            districts: vec![
                outcome(10, Some(Party::Lpc), &[(Party::Lpc, 60.0), (Party::Cpc, 40.0)]),
                outcome(20, Some(Party::Cpc), &[(Party::Lpc, 45.0), (Party::Cpc, 55.0)]),
                outcome(30, Some(Party::Lpc), &[(Party::Lpc, 70.0), (Party::Cpc, 30.0)]),
            ],
        });
        aggregate.record(&TrialOutcome {
            trial: 1,
            districts: vec![
                outcome(10, Some(Party::Cpc), &[(Party::Lpc, 40.0), (Party::Cpc, 60.0)]),
                outcome(20, Some(Party::Cpc), &[(Party::Lpc, 35.0), (Party::Cpc, 65.0)]),
                outcome(30, None, &[(Party::Lpc, 0.0), (Party::Cpc, 0.0)]),
            ],
        });

        assert_eq!(aggregate.trials, 2);
        assert_eq!(aggregate.seat_tallies, vec![[2, 1, 0, 0, 0, 0], [0, 2, 0, 0, 0, 0]]);
        assert_eq!(aggregate.most_seats, [1, 1, 0, 0, 0, 0]);
        assert_eq!(aggregate.win_counts[0], [1, 1, 0, 0, 0, 0]);
        assert_eq!(aggregate.win_counts[2], [1, 0, 0, 0, 0, 0]);

        let lpc_share = aggregate.vote_shares[0].get(Party::Lpc).unwrap();
        assert_eq!(lpc_share.count(), 2);
        assert_eq!(lpc_share.mean(), Some(50.0));
        // The degenerate trial contributes no samples.
        assert_eq!(aggregate.vote_shares[2].get(Party::Lpc).unwrap().count(), 1);
        assert_eq!(aggregate.issues.degenerate_normalizations, 1);
        assert_eq!(aggregate.issues.degenerate_districts.get(&30), Some(&1));
    }

    #[test]
    fn seats_sum_to_decided_ridings_each_trial() {
        let trial = TrialOutcome {
            trial: 0,
            districts: vec![
                outcome(1, Some(Party::Bq), &[(Party::Bq, 100.0)]),
                outcome(2, Some(Party::Ndp), &[(Party::Ndp, 100.0)]),
                outcome(3, Some(Party::Ndp), &[(Party::Ndp, 100.0)]),
            ],
        };
        let tally = trial.seat_tally();
        assert_eq!(tally.iter().sum::<u32>(), 3);
        assert_eq!(plurality(&tally), Some(Party::Ndp));
    }
}
