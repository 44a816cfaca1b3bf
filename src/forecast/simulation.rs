use super::aggregate::{AggregateResult, TrialOutcome};
use super::config::ForecastConfig;
use super::noise::{ErrorModel, NormalErrorModel};
use super::projection::project_district;
use super::weighting::PollAverage;
use super::{ForecastError, ForecastResult};
use crate::model::{District, NationalBaseline, Poll};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Inputs loaded once before any trial runs.
#[derive(Debug, Clone)]
pub struct ForecastInputs {
    pub districts: Vec<District>,
    pub national: NationalBaseline,
    pub polls: Vec<Poll>,
}

/// A configured forecast run over fixed inputs.
pub struct Simulation<'a> {
    inputs: &'a ForecastInputs,
    config: ForecastConfig,
    poll_average: PollAverage,
    seed: u64,
}

impl<'a> Simulation<'a> {
    pub fn new(inputs: &'a ForecastInputs, config: ForecastConfig) -> ForecastResult<Self> {
        config.validate()?;

        if inputs.districts.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no ridings with historical results were loaded".to_string(),
            ));
        }
        if inputs.national.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no national baseline results were loaded".to_string(),
            ));
        }

        let scoped: Vec<Poll> = inputs
            .polls
            .iter()
            .filter(|poll| poll.region.eq_ignore_ascii_case(&config.region))
            .cloned()
            .collect();
        let poll_average = PollAverage::compute(&scoped, config.reference_date())?;
        let seed = config.seed.unwrap_or_else(rand::random);

        Ok(Self {
            inputs,
            config,
            poll_average,
            seed,
        })
    }

    pub fn poll_average(&self) -> &PollAverage {
        &self.poll_average
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent generator for one trial, derived from the base seed.
    pub fn trial_rng(&self, trial: u32) -> StdRng {
        let stream = (trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        StdRng::seed_from_u64(self.seed ^ stream)
    }

    /// Simulate one election. Every riding and party draws fresh noise.
    pub fn run_trial<E: ErrorModel>(&self, trial: u32, noise: &mut E) -> TrialOutcome {
        let districts = self
            .inputs
            .districts
            .iter()
            .map(|district| {
                project_district(
                    district,
                    &self.poll_average.shares,
                    &self.inputs.national,
                    &mut *noise,
                )
            })
            .collect();

        TrialOutcome { trial, districts }
    }

    fn run_seeded_trial(&self, trial: u32) -> TrialOutcome {
        let mut noise = NormalErrorModel::new(self.poll_average.margin_of_error, self.trial_rng(trial));
        self.run_trial(trial, &mut noise)
    }

    pub fn run(&self) -> AggregateResult {
        self.run_with_progress(|_, _| {})
    }

    /// Run every trial. `progress` is called after each chunk with (done, total).
    ///
    /// Chunks are simulated in parallel when enabled but always folded in trial
    /// order, so a fixed seed gives the same result either way.
    pub fn run_with_progress<F>(&self, mut progress: F) -> AggregateResult
    where
        F: FnMut(u32, u32),
    {
        let total = self.config.trials;
        let chunk = self.config.chunk_size.max(1);
        let mut aggregate = AggregateResult::new(self.district_ids());

        let mut start = 0;
        while start < total {
            let end = total.min(start.saturating_add(chunk));
            let outcomes: Vec<TrialOutcome> = if self.config.parallel {
                (start..end)
                    .into_par_iter()
                    .map(|trial| self.run_seeded_trial(trial))
                    .collect()
            } else {
                (start..end).map(|trial| self.run_seeded_trial(trial)).collect()
            };
            for outcome in &outcomes {
                aggregate.record(outcome);
            }
            progress(end, total);
            start = end;
        }

        aggregate
    }

    /// Run sequentially with a caller-supplied error model per trial.
    pub fn run_with<E, F>(&self, mut make_noise: F) -> AggregateResult
    where
        E: ErrorModel,
        F: FnMut(u32) -> E,
    {
        let mut aggregate = AggregateResult::new(self.district_ids());
        for trial in 0..self.config.trials {
            let mut noise = make_noise(trial);
            aggregate.record(&self.run_trial(trial, &mut noise));
        }
        aggregate
    }

    fn district_ids(&self) -> Vec<i64> {
        self.inputs.districts.iter().map(|d| d.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::noise::ZeroErrorModel;
    use crate::model::{Lean, Party, PartyMap};
    use chrono::NaiveDate;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 4, 18).unwrap()
    }

    fn inputs() -> ForecastInputs {
        let mut a = District::new(1, "Ontario", "A");
        a.add_result(Party::Lpc, 60.0, Lean::default());
        a.add_result(Party::Cpc, 40.0, Lean::default());
        let mut b = District::new(2, "Ontario", "B");
        b.add_result(Party::Lpc, 45.0, Lean::default());
        b.add_result(Party::Cpc, 55.0, Lean::default());

        let national: PartyMap<f64> = vec![(Party::Lpc, 50.0), (Party::Cpc, 50.0)].into_iter().collect();
        let poll = Poll {
            region: "National".to_string(),
            firm: "Abacus".to_string(),
            method: None,
            last_date: reference(),
            sample_size: 1200,
            error: 2.8,
            shares: vec![(Party::Lpc, 55.0), (Party::Cpc, 45.0)].into_iter().collect(),
        };
        ForecastInputs {
            districts: vec![a, b],
            national,
            polls: vec![poll],
        }
    }

    fn config(trials: u32, parallel: bool) -> ForecastConfig {
        ForecastConfig {
            trials,
            seed: Some(42),
            reference_date: Some(reference()),
            parallel,
            chunk_size: 64,
            ..ForecastConfig::default()
        }
    }

    #[test]
    fn zero_noise_run_is_fully_determined() {
        let inputs = inputs();
        let simulation = Simulation::new(&inputs, config(10, false)).unwrap();
        let aggregate = simulation.run_with(|_| ZeroErrorModel);

        assert_eq!(aggregate.win_counts[0][Party::Lpc.index()], 10);
        // Level race: LPC is first in canonical order.
        assert_eq!(aggregate.win_counts[1][Party::Lpc.index()], 10);
        assert!(aggregate.seat_tallies.iter().all(|t| t[Party::Lpc.index()] == 2));
        assert_eq!(aggregate.most_seats[Party::Lpc.index()], 10);
    }

    #[test]
    fn win_counts_per_riding_equal_trial_count() {
        let inputs = inputs();
        let simulation = Simulation::new(&inputs, config(300, true)).unwrap();
        let aggregate = simulation.run();

        assert_eq!(aggregate.trials, 300);
        for counts in &aggregate.win_counts {
            assert_eq!(counts.iter().sum::<u32>(), 300);
        }
        for seats in &aggregate.seat_tallies {
            assert_eq!(seats.iter().sum::<u32>() as usize, inputs.districts.len());
        }
    }

    #[test]
    fn fixed_seed_reproduces_across_execution_modes() {
        let inputs = inputs();
        let parallel = Simulation::new(&inputs, config(1000, true)).unwrap().run();
        let sequential = Simulation::new(&inputs, config(1000, false)).unwrap().run();
        let again = Simulation::new(&inputs, config(1000, true)).unwrap().run();

        assert_eq!(parallel.win_counts, sequential.win_counts);
        assert_eq!(parallel.seat_tallies, sequential.seat_tallies);
        assert_eq!(parallel.vote_shares, sequential.vote_shares);
        assert_eq!(parallel.vote_shares, again.vote_shares);
    }

    #[test]
    fn progress_reports_every_chunk() {
        let inputs = inputs();
        let simulation = Simulation::new(&inputs, config(130, false)).unwrap();
        let mut seen = Vec::new();
        simulation.run_with_progress(|done, total| seen.push((done, total)));
        assert_eq!(seen, vec![(64, 130), (128, 130), (130, 130)]);
    }

    #[test]
    fn rejects_bad_configuration_before_simulating() {
        let inputs = inputs();
        let result = Simulation::new(&inputs, config(0, false));
        assert!(matches!(result, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn polls_outside_region_do_not_count() {
        let mut inputs = inputs();
        inputs.polls[0].region = "Quebec".to_string();
        let result = Simulation::new(&inputs, config(10, false));
        assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
    }
}
