use rand::Rng;
use rand_distr::StandardNormal;

/// Source of polling error applied to a national share before projection.
pub trait ErrorModel {
    fn perturb(&mut self, value: f64) -> f64;
}

/// Normal polling error: `value + (z / 2) * margin` with `z ~ N(0, 1)`.
///
/// Halving `z` puts roughly 95% of draws within one margin of the poll.
pub struct NormalErrorModel<R> {
    margin: f64,
    rng: R,
}

impl<R: Rng> NormalErrorModel<R> {
    pub fn new(margin: f64, rng: R) -> Self {
        Self { margin, rng }
    }

    pub fn draw_error(&mut self) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        (z / 2.0) * self.margin
    }
}

impl<R: Rng> ErrorModel for NormalErrorModel<R> {
    fn perturb(&mut self, value: f64) -> f64 {
        value + self.draw_error()
    }
}

/// Returns polls unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroErrorModel;

impl ErrorModel for ZeroErrorModel {
    fn perturb(&mut self, value: f64) -> f64 {
        value
    }
}

impl<M: ErrorModel + ?Sized> ErrorModel for &mut M {
    fn perturb(&mut self, value: f64) -> f64 {
        (**self).perturb(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn injected_error_is_centred_with_half_margin_spread() {
        let margin = 3.0;
        let mut model = NormalErrorModel::new(margin, StdRng::seed_from_u64(2021));
        let draws: Vec<f64> = (0..50_000).map(|_| model.perturb(30.0) - 30.0).collect();

        let n = draws.len() as f64;
        let mean = draws.iter().sum::<f64>() / n;
        let variance = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (n - 1.0);

        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((variance.sqrt() - margin / 2.0).abs() < 0.05, "sd {}", variance.sqrt());
    }

    #[test]
    fn same_seed_same_draws() {
        let mut a = NormalErrorModel::new(2.0, StdRng::seed_from_u64(9));
        let mut b = NormalErrorModel::new(2.0, StdRng::seed_from_u64(9));
        for _ in 0..100 {
            assert_eq!(a.perturb(10.0), b.perturb(10.0));
        }
    }

    #[test]
    fn zero_margin_and_zero_model_leave_value_alone() {
        let mut model = NormalErrorModel::new(0.0, StdRng::seed_from_u64(1));
        assert_eq!(model.perturb(42.0), 42.0);
        assert_eq!(ZeroErrorModel.perturb(42.0), 42.0);
    }
}
