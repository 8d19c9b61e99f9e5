//! Surrogate-model search: fit a model of the objective on the evaluated
//! points, then evaluate where expected improvement is largest.

mod gp;
mod trees;

pub use gp::GaussianProcess;
pub use trees::{ExtraTreesForest, QuantileBoosting};

use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tb_types::{ParameterSet, SearchError, TbResult};
use tracing::{debug, warn};

use crate::space::SearchSpace;
use crate::strategy::SearchStrategy;

/// Regression model of the objective over the unit cube.
pub trait Surrogate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fit on unit-cube points `x`, one per row, and objective values `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut ChaCha8Rng) -> TbResult<()>;

    /// Predictive mean and standard deviation at every row of `x`.
    fn predict(&self, x: &Array2<f64>) -> (Array1<f64>, Array1<f64>);
}

fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> TbResult<()> {
    if y.is_empty() || x.nrows() != y.len() {
        return Err(SearchError::SurrogateFailed {
            message: format!("{} points for {} values", x.nrows(), y.len()),
        }
        .into());
    }
    Ok(())
}

/// Stack equal-length points into a matrix.
fn stack_rows(points: &[Vec<f64>], dims: usize) -> TbResult<Array2<f64>> {
    let flat: Vec<f64> = points.iter().flatten().copied().collect();
    Array2::from_shape_vec((points.len(), dims), flat).map_err(|e| {
        SearchError::SurrogateFailed {
            message: e.to_string(),
        }
        .into()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurrogateConfig {
    /// Random evaluations before the surrogate is consulted.
    pub n_initial_points: usize,
    /// Random candidates scored by the acquisition function per suggestion.
    pub n_candidates: usize,
    /// Improvement margin of expected improvement.
    pub xi: f64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            n_initial_points: 10,
            n_candidates: 1000,
            xi: 0.01,
        }
    }
}

/// Sequential model-based minimisation with expected improvement.
pub struct SurrogateSearch<S> {
    space: SearchSpace,
    surrogate: S,
    config: SurrogateConfig,
    rng: ChaCha8Rng,
    observations: Vec<(ParameterSet, f64)>,
}

impl<S: Surrogate> SurrogateSearch<S> {
    pub fn new(space: SearchSpace, surrogate: S, seed: u64) -> Self {
        Self {
            space,
            surrogate,
            config: SurrogateConfig::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            observations: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SurrogateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn n_observations(&self) -> usize {
        self.observations.len()
    }

    fn suggest_from_model(&mut self, count: usize) -> TbResult<Vec<ParameterSet>> {
        let dims = self.space.len();
        let mut seen = Vec::with_capacity(self.observations.len());
        let mut y = Vec::with_capacity(self.observations.len());
        for (params, value) in &self.observations {
            seen.push(self.space.to_unit(params)?);
            y.push(*value);
        }
        let x = stack_rows(&seen, dims)?;
        let y = Array1::from(y);
        self.surrogate.fit(&x, &y, &mut self.rng)?;
        let y_best = y.iter().cloned().fold(f64::INFINITY, f64::min);

        let mut candidates: Vec<Vec<f64>> = Vec::with_capacity(self.config.n_candidates);
        for _ in 0..self.config.n_candidates {
            let raw: Vec<f64> = (0..dims).map(|_| self.rng.random::<f64>()).collect();
            // Snap onto the grid of integer dimensions before scoring.
            let point = self.space.from_unit(&raw);
            let unit = self.space.to_unit(&point)?;
            if !seen.contains(&unit) {
                candidates.push(unit);
            }
        }
        let mut scored: Vec<(f64, Vec<f64>)> = if candidates.is_empty() {
            Vec::new()
        } else {
            let (mean, std) = self.surrogate.predict(&stack_rows(&candidates, dims)?);
            mean.iter()
                .zip(std.iter())
                .map(|(&m, &s)| expected_improvement(m, s, y_best, self.config.xi))
                .zip(candidates)
                .collect()
        };
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.dedup_by(|a, b| a.1 == b.1);

        if scored.len() < count {
            warn!(
                "{} surrogate found only {} unseen candidates, filling with random points",
                self.surrogate.name(),
                scored.len()
            );
        }
        if let Some((ei, _)) = scored.first() {
            debug!("{} best expected improvement {:.6}", self.surrogate.name(), ei);
        }
        let mut out: Vec<ParameterSet> = scored
            .into_iter()
            .take(count)
            .map(|(_, unit)| self.space.from_unit(&unit))
            .collect();
        while out.len() < count {
            out.push(self.space.sample(&mut self.rng));
        }
        Ok(out)
    }
}

impl<S: Surrogate> SearchStrategy for SurrogateSearch<S> {
    fn suggest(&mut self, count: usize) -> TbResult<Vec<ParameterSet>> {
        if self.observations.len() < self.config.n_initial_points.max(2) {
            return Ok((0..count).map(|_| self.space.sample(&mut self.rng)).collect());
        }
        self.suggest_from_model(count)
    }

    fn report(&mut self, params: &ParameterSet, objective: f64) {
        self.observations.push((params.clone(), objective));
    }

    fn name(&self) -> &str {
        self.surrogate.name()
    }
}

/// Expected improvement below `y_best` for a minimisation problem.
pub fn expected_improvement(mean: f64, std: f64, y_best: f64, xi: f64) -> f64 {
    let improvement = y_best - mean - xi;
    if std <= 1e-12 {
        return improvement.max(0.0);
    }
    let z = improvement / std;
    improvement * norm_cdf(z) + std * norm_pdf(z)
}

/// Standard normal cumulative distribution function (Abramowitz & Stegun 7.1.26).
fn norm_cdf(x: f64) -> f64 {
    if x >= 8.0 {
        return 1.0;
    }
    if x <= -8.0 {
        return 0.0;
    }

    let a1 = 0.254829592_f64;
    let a2 = -0.284496736_f64;
    let a3 = 1.421413741_f64;
    let a4 = -1.453152027_f64;
    let a5 = 1.061405429_f64;
    let p = 0.3275911_f64;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + p * z);
    let erf = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();

    0.5 * (1.0 + sign * erf)
}

fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}
