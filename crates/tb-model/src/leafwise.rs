//! LightGBM backend of the leaf-wise family.

use lightgbm3::{Booster, Dataset, ImportanceType as NativeImportance};
use serde_json::{json, Value};
use tb_types::{BoostingFamily, FeatureMatrix, TbResult};
use tracing::debug;

use crate::labels::Task;
use crate::native::{native_error, Backend, SplitStats};
use crate::params::BoosterParams;

/// Trains through `lightgbm3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightGbm;

impl LightGbm {
    /// Native parameter object for one training run.
    pub fn parameters(params: &BoosterParams, task: Task) -> Value {
        let mut native = json!({
            "learning_rate": params.learning_rate,
            "num_iterations": params.n_estimators,
            "num_leaves": params.num_leaves,
            "max_depth": params.max_depth,
            "min_data_in_leaf": params.min_child_samples,
            "min_sum_hessian_in_leaf": params.min_child_weight,
            "lambda_l2": params.reg_lambda,
            "min_gain_to_split": params.min_split_gain,
            "feature_fraction": params.colsample_bytree,
            "max_bin": params.max_bins,
            "seed": params.random_state,
            "deterministic": true,
            "verbosity": -1,
        });
        if params.subsample < 1.0 {
            native["bagging_fraction"] = json!(params.subsample);
            native["bagging_freq"] = json!(1);
        }
        match task {
            Task::Regression => native["objective"] = json!("regression"),
            Task::Binary => native["objective"] = json!("binary"),
            Task::Multiclass { n_classes } => {
                native["objective"] = json!("multiclass");
                native["num_class"] = json!(n_classes);
            }
        }
        native
    }
}

impl Backend for LightGbm {
    type Model = Booster;

    const FAMILY: BoostingFamily = BoostingFamily::LightGbm;

    fn train(params: &BoosterParams, task: Task, x: &FeatureMatrix, y: &[f64]) -> TbResult<Booster> {
        let rows: Vec<Vec<f64>> = x.view().outer_iter().map(|row| row.to_vec()).collect();
        let labels: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        let dataset = Dataset::from_vec_of_vec(rows, labels, true)
            .map_err(|e| native_error(Self::FAMILY, e))?;

        let native = Self::parameters(params, task);
        debug!("Training LightGBM with {}", native);
        Booster::train(dataset, &native).map_err(|e| native_error(Self::FAMILY, e))
    }

    fn predict(model: &Booster, _task: Task, x: &FeatureMatrix) -> TbResult<Vec<f64>> {
        model
            .predict(&x.to_row_major_vec(), x.n_cols() as i32, true)
            .map_err(|e| native_error(Self::FAMILY, e))
    }

    fn split_stats(model: &Booster, _n_features: usize) -> TbResult<SplitStats> {
        let splits = model
            .feature_importance(NativeImportance::Split)
            .map_err(|e| native_error(Self::FAMILY, e))?;
        let gains = model
            .feature_importance(NativeImportance::Gain)
            .map_err(|e| native_error(Self::FAMILY, e))?;
        Ok(SplitStats { splits, gains })
    }
}
