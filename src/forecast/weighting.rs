use super::{ForecastError, ForecastResult};
use crate::model::{Party, PartyMap, Poll};
use crate::util::round_to;
use chrono::NaiveDate;
use serde::Serialize;

/// Sample size that earns a size factor of exactly 1.
const REFERENCE_SAMPLE: f64 = 600.0;
/// Polls younger than this keep their full weight.
const FRESH_DAYS: i64 = 8;
/// Polls this old or older are dropped.
const CUTOFF_DAYS: i64 = 29;
const DAILY_DECAY: f64 = 0.047;

/// Weight of a single poll from its sample size and age in days.
///
/// `sqrt(sample / 600)`, decayed linearly by 4.7% per day past the first
/// week and zeroed from day 29 on, then rounded to two decimals. A zero
/// sample, or one whose weight rounds below 0.005, yields zero weight.
pub fn poll_weight(sample_size: u32, age_days: i64) -> f64 {
    if sample_size == 0 {
        return 0.0;
    }
    let size_factor = (sample_size as f64 / REFERENCE_SAMPLE).sqrt();
    let recency = if age_days < FRESH_DAYS {
        1.0
    } else if age_days < CUTOFF_DAYS {
        (1.0 - DAILY_DECAY * (age_days - 7) as f64).max(0.0)
    } else {
        0.0
    };
    round_to(size_factor * recency, 2)
}

/// `sum(value * weight) / sum(weight)`, or `None` when the weights sum to zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (numerator, denominator) = pairs
        .into_iter()
        .filter(|(_, weight)| *weight > 0.0)
        .fold((0.0, 0.0), |(num, den), (value, weight)| {
            (num + value * weight, den + weight)
        });
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollWeight {
    pub firm: String,
    pub last_date: NaiveDate,
    pub age_days: i64,
    pub sample_size: u32,
    pub weight: f64,
}

pub fn weigh_polls(polls: &[Poll], reference: NaiveDate) -> Vec<PollWeight> {
    polls
        .iter()
        .map(|poll| {
            let age_days = poll.age_days(reference);
            PollWeight {
                firm: poll.firm.clone(),
                last_date: poll.last_date,
                age_days,
                sample_size: poll.sample_size,
                weight: poll_weight(poll.sample_size, age_days),
            }
        })
        .collect()
}

/// Weighted national picture: one share per polled party plus the margin of error.
#[derive(Debug, Clone, Serialize)]
pub struct PollAverage {
    pub reference_date: NaiveDate,
    pub shares: PartyMap<f64>,
    pub margin_of_error: f64,
    pub polls_used: usize,
}

impl PollAverage {
    pub fn compute(polls: &[Poll], reference: NaiveDate) -> ForecastResult<Self> {
        let weights = weigh_polls(polls, reference);
        let weighted: Vec<(&Poll, f64)> = polls
            .iter()
            .zip(weights.iter().map(|w| w.weight))
            .filter(|(_, weight)| *weight > 0.0)
            .collect();

        if weighted.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "none of {} polls carries weight on {} (all older than {} days or with empty samples)",
                polls.len(),
                reference,
                CUTOFF_DAYS - 1
            )));
        }

        let mut shares = PartyMap::new();
        for party in Party::ALL {
            if !weighted.iter().any(|(poll, _)| poll.shares.contains(party)) {
                continue;
            }
            // Unreported shares count as zero for polls that did not list the party.
            let average = weighted_mean(
                weighted
                    .iter()
                    .map(|(poll, weight)| (poll.shares.get(party).copied().unwrap_or(0.0), *weight)),
            );
            if let Some(average) = average {
                shares.insert(party, round_to(average, 1));
            }
        }

        let margin_of_error = weighted_mean(
            weighted
                .iter()
                .filter(|(poll, _)| poll.error.is_finite() && poll.error >= 0.0)
                .map(|(poll, weight)| (poll.error, *weight)),
        )
        .map(|margin| round_to(margin, 1))
        .ok_or_else(|| {
            ForecastError::InsufficientData(
                "no weighted poll reports a usable margin of error".to_string(),
            )
        })?;

        Ok(Self {
            reference_date: reference,
            shares,
            margin_of_error,
            polls_used: weighted.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn poll(last_date: NaiveDate, sample_size: u32, error: f64, shares: &[(Party, f64)]) -> Poll {
        Poll {
            region: "National".to_string(),
            firm: "Leger".to_string(),
            method: Some("Online".to_string()),
            last_date,
            sample_size,
            error,
            shares: shares.iter().copied().collect(),
        }
    }

    #[test]
    fn fresh_poll_weight_depends_only_on_sample() {
        assert_eq!(poll_weight(600, 0), 1.0);
        assert_eq!(poll_weight(2400, 7), 2.0);
    }

    #[test]
    fn weight_decays_after_a_week_and_vanishes_at_cutoff() {
        let mut previous = poll_weight(1000, 7);
        for age in 8..29 {
            let weight = poll_weight(1000, age);
            assert!(weight < previous, "weight did not decrease at age {}", age);
            assert!(weight > 0.0);
            previous = weight;
        }
        assert_eq!(poll_weight(1000, 29), 0.0);
        assert_eq!(poll_weight(1000, 400), 0.0);
        assert_eq!(poll_weight(600, 10), 0.86);
    }

    #[test]
    fn weights_are_rounded_to_hundredths() {
        // sqrt(1200 / 600) = 1.41421...
        assert_eq!(poll_weight(1200, 0), 1.41);
        // sqrt(10 / 600) * (1 - 0.047 * 21) = 0.0017...
        assert_eq!(poll_weight(10, 28), 0.0);
        let today = date(2021, 4, 18);
        let polls = vec![
            poll(today - chrono::Duration::days(28), 10, 9.0, &[(Party::Lpc, 90.0)]),
            poll(today, 600, 3.0, &[(Party::Lpc, 30.0)]),
        ];
        let average = PollAverage::compute(&polls, today).unwrap();
        assert_eq!(average.polls_used, 1);
        assert_eq!(average.shares.get(Party::Lpc), Some(&30.0));
    }

    #[test]
    fn empty_sample_contributes_nothing() {
        assert_eq!(poll_weight(0, 0), 0.0);
        let today = date(2021, 4, 18);
        let polls = vec![
            poll(today, 0, 9.0, &[(Party::Lpc, 90.0)]),
            poll(today, 600, 3.0, &[(Party::Lpc, 30.0)]),
        ];
        let average = PollAverage::compute(&polls, today).unwrap();
        assert_eq!(average.shares.get(Party::Lpc), Some(&30.0));
        assert_eq!(average.margin_of_error, 3.0);
        assert_eq!(average.polls_used, 1);
    }

    #[test]
    fn averages_shares_and_margin_with_the_same_weights() {
        let today = date(2021, 4, 18);
        let polls = vec![
            poll(today, 600, 2.0, &[(Party::Lpc, 40.0), (Party::Cpc, 30.0)]),
            poll(today, 2400, 4.0, &[(Party::Lpc, 34.0), (Party::Cpc, 33.0)]),
        ];
        // weights 1 and 2
        let average = PollAverage::compute(&polls, today).unwrap();
        assert_eq!(average.shares.get(Party::Lpc), Some(&36.0));
        assert_eq!(average.shares.get(Party::Cpc), Some(&32.0));
        assert!((average.margin_of_error - 3.3).abs() < 1e-9);
        assert!(!average.shares.contains(Party::Bq));
    }

    #[test]
    fn stale_polls_are_insufficient() {
        let polls = vec![poll(date(2021, 1, 1), 1500, 2.5, &[(Party::Lpc, 35.0)])];
        let result = PollAverage::compute(&polls, date(2021, 4, 18));
        assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
        assert!(matches!(
            PollAverage::compute(&[], date(2021, 4, 18)),
            Err(ForecastError::InsufficientData(_))
        ));
    }

    #[test]
    fn future_dated_polls_age_by_distance() {
        let reference = date(2021, 4, 18);
        let polls = vec![poll(date(2021, 5, 30), 1000, 2.0, &[(Party::Lpc, 35.0)])];
        assert!(PollAverage::compute(&polls, reference).is_err());
    }
}
