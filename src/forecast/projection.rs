use super::noise::ErrorModel;
use super::{DistrictIssue, MissingReason};
use crate::model::{District, NationalBaseline, Party, PartyMap};

/// One riding's result in one trial.
#[derive(Debug, Clone)]
pub struct DistrictOutcome {
    pub district_id: i64,
    /// Normalized shares summing to 100, or all zero when degenerate.
    pub shares: PartyMap<f64>,
    /// `None` when the riding could not be normalized.
    pub winner: Option<Party>,
    pub issues: Vec<DistrictIssue>,
}

impl DistrictOutcome {
    pub fn is_degenerate(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| *issue == DistrictIssue::DegenerateNormalization)
    }
}

/// Project a riding from its history, the (noisy) national polls and the
/// historical national result, using proportional swing.
pub fn project_district<E: ErrorModel>(
    district: &District,
    poll_average: &PartyMap<f64>,
    national: &NationalBaseline,
    noise: &mut E,
) -> DistrictOutcome {
    let mut shares = PartyMap::new();
    let mut issues = Vec::new();

    for (party, &baseline) in district.baseline.iter() {
        match project_party(party, baseline, poll_average, national, noise) {
            Ok(projected) => {
                shares.insert(party, projected);
            }
            Err(reason) => issues.push(DistrictIssue::MissingPartyData { party, reason }),
        }
    }

    let total = shares.total();
    let winner = if total > 0.0 && total.is_finite() {
        for (_, share) in shares.iter_mut() {
            *share = *share / total * 100.0;
        }
        shares.leader()
    } else {
        issues.push(DistrictIssue::DegenerateNormalization);
        None
    };

    DistrictOutcome {
        district_id: district.id,
        shares,
        winner,
        issues,
    }
}

fn project_party<E: ErrorModel>(
    party: Party,
    baseline: f64,
    poll_average: &PartyMap<f64>,
    national: &NationalBaseline,
    noise: &mut E,
) -> Result<f64, MissingReason> {
    if !baseline.is_finite() || baseline < 0.0 {
        return Err(MissingReason::MalformedBaseline);
    }
    let polled = *poll_average
        .get(party)
        .ok_or(MissingReason::NoPollAverage)?;
    let national_share = *national
        .get(party)
        .ok_or(MissingReason::NoNationalBaseline)?;
    if !national_share.is_finite() || national_share <= 0.0 {
        return Err(MissingReason::ZeroNationalBaseline);
    }

    let perturbed = noise.perturb(polled);
    let proportional_change = (perturbed - national_share) / national_share;
    Ok((baseline * (1.0 + proportional_change)).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::noise::{NormalErrorModel, ZeroErrorModel};
    use crate::model::Lean;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn district(id: i64, shares: &[(Party, f64)]) -> District {
        let mut district = District::new(id, "Ontario", format!("Riding {}", id));
        for &(party, share) in shares {
            district.add_result(party, share, Lean::default());
        }
        district
    }

    fn two_party(a: f64, b: f64) -> PartyMap<f64> {
        vec![(Party::Lpc, a), (Party::Cpc, b)].into_iter().collect()
    }

    #[test]
    fn proportional_swing_with_zero_error() {
        let national = two_party(50.0, 50.0);
        let polls = two_party(55.0, 45.0);

        let a = project_district(&district(1, &[(Party::Lpc, 60.0), (Party::Cpc, 40.0)]), &polls, &national, &mut ZeroErrorModel);
        let lpc = a.shares.get(Party::Lpc).copied().unwrap();
        let cpc = a.shares.get(Party::Cpc).copied().unwrap();
        assert!((lpc - 66.0 / 102.0 * 100.0).abs() < 1e-9);
        assert!((cpc - 36.0 / 102.0 * 100.0).abs() < 1e-9);
        assert_eq!((lpc * 10.0).round() / 10.0, 64.7);
        assert_eq!(a.winner, Some(Party::Lpc));
        assert!(a.issues.is_empty());

        let b = project_district(&district(2, &[(Party::Lpc, 45.0), (Party::Cpc, 55.0)]), &polls, &national, &mut ZeroErrorModel);
        assert!((b.shares.get(Party::Lpc).unwrap() - 50.0).abs() < 1e-9);
        assert!((b.shares.get(Party::Cpc).unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(b.winner, Some(Party::Lpc));
    }

    #[test]
    fn normalized_shares_sum_to_one_hundred() {
        let national: PartyMap<f64> = vec![
            (Party::Lpc, 33.1),
            (Party::Cpc, 34.3),
            (Party::Ndp, 16.0),
            (Party::Gpc, 6.5),
            (Party::Bq, 7.6),
        ]
        .into_iter()
        .collect();
        let polls: PartyMap<f64> = vec![
            (Party::Lpc, 35.0),
            (Party::Cpc, 30.2),
            (Party::Ndp, 18.9),
            (Party::Gpc, 5.1),
            (Party::Bq, 7.0),
        ]
        .into_iter()
        .collect();
        let riding = district(
            24001,
            &[(Party::Lpc, 30.0), (Party::Cpc, 10.0), (Party::Ndp, 8.0), (Party::Gpc, 4.0), (Party::Bq, 48.0)],
        );

        let mut noise = NormalErrorModel::new(3.0, StdRng::seed_from_u64(11));
        for _ in 0..500 {
            let outcome = project_district(&riding, &polls, &national, &mut noise);
            if outcome.is_degenerate() {
                continue;
            }
            assert!((outcome.shares.total() - 100.0).abs() < 1e-6);
            assert!(outcome.shares.values().all(|share| *share >= 0.0));
        }
    }

    #[test]
    fn missing_party_data_skips_only_that_party() {
        let national: PartyMap<f64> = vec![(Party::Lpc, 50.0), (Party::Cpc, 50.0), (Party::Gpc, 0.0)]
            .into_iter()
            .collect();
        let polls = two_party(50.0, 50.0);
        let riding = district(3, &[(Party::Lpc, 40.0), (Party::Cpc, 40.0), (Party::Gpc, 10.0), (Party::Other, 10.0)]);

        let outcome = project_district(&riding, &polls, &national, &mut ZeroErrorModel);
        assert_eq!(outcome.shares.len(), 2);
        assert!((outcome.shares.total() - 100.0).abs() < 1e-9);
        assert!(outcome.issues.contains(&DistrictIssue::MissingPartyData {
            party: Party::Gpc,
            reason: MissingReason::NoPollAverage,
        }));
        assert!(outcome.issues.contains(&DistrictIssue::MissingPartyData {
            party: Party::Other,
            reason: MissingReason::NoPollAverage,
        }));
    }

    #[test]
    fn zero_national_baseline_is_missing_data() {
        let national = two_party(50.0, 0.0);
        let polls = two_party(50.0, 50.0);
        let outcome = project_district(&district(4, &[(Party::Lpc, 60.0), (Party::Cpc, 40.0)]), &polls, &national, &mut ZeroErrorModel);
        assert_eq!(outcome.winner, Some(Party::Lpc));
        assert_eq!(
            outcome.issues,
            vec![DistrictIssue::MissingPartyData {
                party: Party::Cpc,
                reason: MissingReason::ZeroNationalBaseline,
            }]
        );
    }

    #[test]
    fn all_zero_projection_is_degenerate() {
        let national = two_party(50.0, 50.0);
        // Polling at zero wipes out every party.
        let polls = two_party(0.0, 0.0);
        let outcome = project_district(&district(5, &[(Party::Lpc, 60.0), (Party::Cpc, 40.0)]), &polls, &national, &mut ZeroErrorModel);
        assert!(outcome.is_degenerate());
        assert_eq!(outcome.winner, None);
        assert!(outcome.shares.values().all(|share| *share == 0.0));
    }
}
