use ndarray::{Array1, Array2, ArrayView1};
use rand_chacha::ChaCha8Rng;
use tb_types::TbResult;
use tracing::debug;

use super::{check_shapes, Surrogate};
use tb_types::SearchError;

const LENGTH_SCALES: [f64; 8] = [0.05, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0];
const NOISE_LEVELS: [f64; 4] = [1e-6, 1e-4, 1e-2, 1e-1];

/// Gaussian process with an isotropic Matern 5/2 kernel on standardised
/// targets. Length scale and noise are picked from a fixed grid by log
/// marginal likelihood on every fit.
#[derive(Debug, Clone, Default)]
pub struct GaussianProcess {
    fitted: Option<FittedGp>,
}

#[derive(Debug, Clone)]
struct FittedGp {
    x: Array2<f64>,
    /// Lower Cholesky factor of K + noise * I.
    chol: Array2<f64>,
    alpha: Array1<f64>,
    length_scale: f64,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    pub fn length_scale(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.length_scale)
    }
}

impl Surrogate for GaussianProcess {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, _rng: &mut ChaCha8Rng) -> TbResult<()> {
        check_shapes(x, y)?;
        let n = y.len();
        let y_mean = y.mean().unwrap_or(0.0);
        let y_std = match y.std(0.0) {
            s if s > 0.0 => s,
            _ => 1.0,
        };
        let ys = y.mapv(|v| (v - y_mean) / y_std);

        let mut best: Option<(f64, FittedGp)> = None;
        for &length_scale in &LENGTH_SCALES {
            let base = kernel_matrix(x, x, length_scale);
            for &noise in &NOISE_LEVELS {
                let k = &base + &(Array2::<f64>::eye(n) * noise);
                let Some(chol) = cholesky(&k) else {
                    continue;
                };
                let alpha = cholesky_solve(&chol, ys.view());
                let data_fit = ys.dot(&alpha);
                let log_det: f64 = chol.diag().iter().map(|d| d.ln()).sum();
                let lml = -0.5 * data_fit
                    - log_det
                    - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();
                if best.as_ref().map_or(true, |(b, _)| lml > *b) {
                    best = Some((
                        lml,
                        FittedGp {
                            x: x.clone(),
                            chol,
                            alpha,
                            length_scale,
                            y_mean,
                            y_std,
                        },
                    ));
                }
            }
        }

        let (lml, fitted) = best.ok_or_else(|| SearchError::SurrogateFailed {
            message: "kernel matrix is not positive definite for any hyperparameters".to_string(),
        })?;
        debug!(
            "GP fitted on {} points: length_scale={}, log marginal likelihood={:.4}",
            n, fitted.length_scale, lml
        );
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        let Some(gp) = &self.fitted else {
            return (Array1::zeros(x.nrows()), Array1::ones(x.nrows()));
        };
        let k_star = kernel_matrix(x, &gp.x, gp.length_scale);
        let mean = k_star.dot(&gp.alpha).mapv(|m| gp.y_mean + m * gp.y_std);
        let std = k_star
            .rows()
            .into_iter()
            .map(|k| {
                let v = forward_substitute(&gp.chol, k);
                (1.0 - v.dot(&v)).max(1e-12).sqrt() * gp.y_std
            })
            .collect();
        (mean, std)
    }
}

fn matern52(a: ArrayView1<f64>, b: ArrayView1<f64>, length_scale: f64) -> f64 {
    let diff = &a - &b;
    let r = diff.dot(&diff).sqrt() / length_scale;
    let s = 5f64.sqrt() * r;
    (1.0 + s + s * s / 3.0) * (-s).exp()
}

/// Kernel between every row of `a` and every row of `b`.
fn kernel_matrix(a: &Array2<f64>, b: &Array2<f64>, length_scale: f64) -> Array2<f64> {
    Array2::from_shape_fn((a.nrows(), b.nrows()), |(i, j)| {
        matern52(a.row(i), b.row(j), length_scale)
    })
}

/// Lower Cholesky factor, `None` unless positive definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve L v = b.
fn forward_substitute(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut v = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * v[k];
        }
        v[i] = sum / l[[i, i]];
    }
    v
}

/// Solve (L L^T) x = b.
fn cholesky_solve(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let v = forward_substitute(l, b);
    let n = v.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = v[i];
        for k in i + 1..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn cholesky_solves_linear_system() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        let x = cholesky_solve(&l, array![2.0, 1.0].view());
        let back = a.dot(&x);
        assert!((back[0] - 2.0).abs() < 1e-12);
        assert!((back[1] - 1.0).abs() < 1e-12);
        assert!(cholesky(&array![[1.0, 2.0], [2.0, 1.0]]).is_none());
    }

    #[test]
    fn interpolates_observations_with_low_uncertainty() {
        let x = Array2::from_shape_fn((8, 1), |(i, _)| i as f64 / 7.0);
        let y = x.column(0).mapv(|p| (6.0 * p).sin());
        let mut gp = GaussianProcess::default();
        gp.fit(&x, &y, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();

        let queries = array![[3.0 / 7.0], [3.0]];
        let (mean, std) = gp.predict(&queries);
        assert!((mean[0] - y[3]).abs() < 0.05, "mean {} vs {}", mean[0], y[3]);
        assert!(std[1] > std[0]);
    }

    #[test]
    fn constant_targets_do_not_break_fit() {
        let x = array![[0.1, 0.2], [0.5, 0.5], [0.9, 0.1]];
        let y = array![2.0, 2.0, 2.0];
        let mut gp = GaussianProcess::default();
        gp.fit(&x, &y, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        let (mean, _) = gp.predict(&array![[0.4, 0.4]]);
        assert!((mean[0] - 2.0).abs() < 1e-6);
    }
}
