use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tb_types::TbResult;
use tracing::debug;

use super::{check_shapes, Surrogate};

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Small regression tree fitted by squared-error reduction.
#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    /// Draw one random threshold per feature instead of scanning all.
    random_thresholds: bool,
}

impl RegressionTree {
    /// Fit on `targets`; leaves hold `leaf_value(rows)`.
    fn fit<F>(
        x: &Array2<f64>,
        targets: &Array1<f64>,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
        leaf_value: &F,
    ) -> Self
    where
        F: Fn(&[usize]) -> f64,
    {
        let mut tree = Self { nodes: Vec::new() };
        let rows: Vec<usize> = (0..targets.len()).collect();
        tree.grow(x, targets, rows, 0, params, rng, leaf_value);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow<F>(
        &mut self,
        x: &Array2<f64>,
        targets: &Array1<f64>,
        rows: Vec<usize>,
        depth: usize,
        params: TreeParams,
        rng: &mut ChaCha8Rng,
        leaf_value: &F,
    ) -> usize
    where
        F: Fn(&[usize]) -> f64,
    {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: leaf_value(&rows),
        });
        if params.max_depth.is_some_and(|d| depth >= d) || rows.len() < 2 * params.min_samples_leaf {
            return id;
        }
        let Some((feature, threshold)) = best_split(x, targets, &rows, params, rng) else {
            return id;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| x[[r, feature]] <= threshold);
        let left = self.grow(x, targets, left_rows, depth + 1, params, rng, leaf_value);
        let right = self.grow(x, targets, right_rows, depth + 1, params, rng, leaf_value);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

/// Sum of squared deviations of a subset, via running sums.
fn sse(sum: f64, sum_sq: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum_sq - sum * sum / n as f64
    }
}

fn best_split(
    x: &Array2<f64>,
    targets: &Array1<f64>,
    rows: &[usize],
    params: TreeParams,
    rng: &mut ChaCha8Rng,
) -> Option<(usize, f64)> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| targets[r]).sum();
    let total_sq: f64 = rows.iter().map(|&r| targets[r].powi(2)).sum();
    let parent = sse(total, total_sq, n);
    let n_features = x.ncols();

    let mut best: Option<(f64, usize, f64)> = None;
    for feature in 0..n_features {
        let mut sorted: Vec<usize> = rows.to_vec();
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        let lo = x[[sorted[0], feature]];
        let hi = x[[sorted[n - 1], feature]];
        if hi <= lo {
            continue;
        }

        if params.random_thresholds {
            // Draw only where both children keep `min_samples_leaf` rows.
            let msl = params.min_samples_leaf.max(1);
            let lo = x[[sorted[msl - 1], feature]];
            let hi = x[[sorted[n - msl], feature]];
            if hi <= lo {
                continue;
            }
            let threshold = rng.random_range(lo..hi);
            let (mut s, mut sq, mut k) = (0.0, 0.0, 0usize);
            for &r in sorted.iter().take_while(|&&r| x[[r, feature]] <= threshold) {
                s += targets[r];
                sq += targets[r].powi(2);
                k += 1;
            }
            if k < params.min_samples_leaf || n - k < params.min_samples_leaf {
                continue;
            }
            let child = sse(s, sq, k) + sse(total - s, total_sq - sq, n - k);
            let gain = parent - child;
            if best.map_or(true, |(g, _, _)| gain > g) {
                best = Some((gain, feature, threshold));
            }
            continue;
        }

        let (mut s, mut sq) = (0.0, 0.0);
        for i in 0..n - 1 {
            let r = sorted[i];
            s += targets[r];
            sq += targets[r].powi(2);
            let k = i + 1;
            let here = x[[r, feature]];
            let next = x[[sorted[i + 1], feature]];
            if next <= here || k < params.min_samples_leaf || n - k < params.min_samples_leaf {
                continue;
            }
            let child = sse(s, sq, k) + sse(total - s, total_sq - sq, n - k);
            let gain = parent - child;
            if best.map_or(true, |(g, _, _)| gain > g) {
                best = Some((gain, feature, here + (next - here) / 2.0));
            }
        }
    }
    best.map(|(_, feature, threshold)| (feature, threshold))
}

/// `alpha`-quantile by linear interpolation between order statistics.
fn quantile(values: &mut [f64], alpha: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let pos = alpha * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}

// ---- Gradient-boosted quantile surrogate ----

#[derive(Debug, Clone)]
struct QuantileModel {
    init: f64,
    trees: Vec<RegressionTree>,
}

/// Three quantile-loss boosters (16th, 50th, 84th percentile); the median is
/// the mean estimate and half the 16-84 spread the standard deviation.
#[derive(Debug, Clone)]
pub struct QuantileBoosting {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    quantiles: [f64; 3],
    models: Vec<QuantileModel>,
}

impl Default for QuantileBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 30,
            max_depth: 3,
            learning_rate: 0.1,
            quantiles: [0.16, 0.5, 0.84],
            models: Vec::new(),
        }
    }
}

impl QuantileBoosting {
    fn fit_quantile(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        alpha: f64,
        rng: &mut ChaCha8Rng,
    ) -> QuantileModel {
        let params = TreeParams {
            max_depth: Some(self.max_depth),
            min_samples_leaf: 1,
            random_thresholds: false,
        };
        let init = quantile(&mut y.to_vec(), alpha);
        let mut pred = Array1::from_elem(y.len(), init);
        let mut trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let residuals = y - &pred;
            let negative_gradient = residuals.mapv(|r| if r > 0.0 { alpha } else { alpha - 1.0 });
            let leaf_value = |rows: &[usize]| {
                let mut leaf: Vec<f64> = rows.iter().map(|&r| residuals[r]).collect();
                quantile(&mut leaf, alpha)
            };
            let tree = RegressionTree::fit(x, &negative_gradient, params, rng, &leaf_value);
            for (p, row) in pred.iter_mut().zip(x.rows()) {
                *p += self.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }
        QuantileModel { init, trees }
    }

    fn predict_quantile(&self, model: &QuantileModel, x: ArrayView1<f64>) -> f64 {
        model.init
            + self.learning_rate * model.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }
}

impl Surrogate for QuantileBoosting {
    fn name(&self) -> &'static str {
        "gradient_boosted_trees"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut ChaCha8Rng) -> TbResult<()> {
        check_shapes(x, y)?;
        self.models = self
            .quantiles
            .iter()
            .map(|&alpha| self.fit_quantile(x, y, alpha, rng))
            .collect();
        debug!("Quantile boosting fitted on {} points", y.len());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = x.nrows();
        let [low, mid, high] = self.models.as_slice() else {
            return (Array1::zeros(n), Array1::ones(n));
        };
        let mut mean = Array1::zeros(n);
        let mut std = Array1::zeros(n);
        for (i, row) in x.rows().into_iter().enumerate() {
            let spread = self.predict_quantile(high, row) - self.predict_quantile(low, row);
            mean[i] = self.predict_quantile(mid, row);
            std[i] = (spread / 2.0).abs();
        }
        (mean, std)
    }
}

// ---- Extra-trees forest surrogate ----

/// Extremely randomised trees; mean and spread across trees.
#[derive(Debug, Clone)]
pub struct ExtraTreesForest {
    pub n_estimators: usize,
    pub min_samples_leaf: usize,
    trees: Vec<RegressionTree>,
}

impl Default for ExtraTreesForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            min_samples_leaf: 3,
            trees: Vec::new(),
        }
    }
}

impl Surrogate for ExtraTreesForest {
    fn name(&self) -> &'static str {
        "decision_trees"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut ChaCha8Rng) -> TbResult<()> {
        check_shapes(x, y)?;
        let params = TreeParams {
            max_depth: None,
            min_samples_leaf: self.min_samples_leaf,
            random_thresholds: true,
        };
        let mean = |rows: &[usize]| rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len().max(1) as f64;
        self.trees = (0..self.n_estimators)
            .map(|_| RegressionTree::fit(x, y, params, rng, &mean))
            .collect();
        debug!("Extra-trees forest of {} fitted on {} points", self.trees.len(), y.len());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        if self.trees.is_empty() {
            return (Array1::zeros(x.nrows()), Array1::ones(x.nrows()));
        }
        // One row per tree, one column per query point.
        let per_tree = Array2::from_shape_fn((self.trees.len(), x.nrows()), |(t, i)| {
            self.trees[t].predict(x.row(i))
        });
        let mean = per_tree.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.nrows()));
        let std = per_tree.std_axis(Axis(0), 0.0);
        (mean, std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64 / 19.0);
        let y = x.column(0).mapv(|p| if p < 0.5 { 1.0 } else { 5.0 });
        (x, y)
    }

    #[test]
    fn quantile_interpolates() {
        assert_eq!(quantile(&mut [3.0, 1.0, 2.0], 0.5), 2.0);
        assert_eq!(quantile(&mut [0.0, 10.0], 0.25), 2.5);
    }

    #[test]
    fn cart_tree_finds_step() {
        let (x, y) = step_data();
        let params = TreeParams {
            max_depth: Some(1),
            min_samples_leaf: 1,
            random_thresholds: false,
        };
        let mean = |rows: &[usize]| rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64;
        let tree = RegressionTree::fit(&x, &y, params, &mut ChaCha8Rng::seed_from_u64(0), &mean);
        assert_eq!(tree.predict(array![0.1].view()), 1.0);
        assert_eq!(tree.predict(array![0.9].view()), 5.0);
    }

    #[test]
    fn quantile_boosting_orders_its_band() {
        let (x, y) = step_data();
        let mut model = QuantileBoosting::default();
        model.fit(&x, &y, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        let (mean, std) = model.predict(&array![[0.1], [0.9]]);
        assert!(mean[0] < mean[1]);
        assert!(std.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn forest_tracks_step_with_spread() {
        let (x, y) = step_data();
        let mut forest = ExtraTreesForest::default();
        forest.fit(&x, &y, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        let (mean, _) = forest.predict(&array![[0.05], [0.95]]);
        assert!(mean[0] < 2.5 && mean[1] > 3.5, "left {}, right {}", mean[0], mean[1]);
        assert_eq!(forest.trees.len(), 100);
    }

    #[test]
    fn unfitted_models_predict_a_flat_prior() {
        let (mean, std) = ExtraTreesForest::default().predict(&array![[0.2], [0.4]]);
        assert_eq!(mean, array![0.0, 0.0]);
        assert_eq!(std, array![1.0, 1.0]);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let mut forest = ExtraTreesForest::default();
        let err = forest.fit(&array![[0.0]], &array![1.0, 2.0], &mut ChaCha8Rng::seed_from_u64(0));
        assert!(err.is_err());
    }
}
