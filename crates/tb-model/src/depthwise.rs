//! XGBoost backend of the depth-wise family.

use tb_types::{BoostingFamily, FeatureMatrix, TbResult};
use tracing::debug;
use xgboost::parameters::learning::{LearningTaskParametersBuilder, Objective};
use xgboost::parameters::tree::{TreeBoosterParametersBuilder, TreeMethod};
use xgboost::parameters::{BoosterParametersBuilder, BoosterType, TrainingParametersBuilder};
use xgboost::{Booster, DMatrix};

use crate::labels::Task;
use crate::native::{native_error, Backend, SplitStats};
use crate::params::BoosterParams;

/// Trains through `xgboost` with the histogram tree method, so `num_leaves`
/// applies as `max_leaves`.
#[derive(Debug, Clone, Copy, Default)]
pub struct XgBoost;

impl XgBoost {
    /// Depth cap: the configured limit, else the depth a balanced tree needs
    /// to hold `num_leaves` leaves.
    pub fn max_depth(params: &BoosterParams) -> u32 {
        match params.depth_limit() {
            Some(depth) => depth as u32,
            None => (params.num_leaves.max(2) as f64).log2().ceil() as u32,
        }
    }

    pub fn objective(task: Task) -> Objective {
        match task {
            Task::Regression => Objective::RegLinear,
            Task::Binary => Objective::BinaryLogistic,
            Task::Multiclass { n_classes } => Objective::MultiSoftprob(n_classes as u32),
        }
    }

    fn dmatrix(x: &FeatureMatrix) -> TbResult<DMatrix> {
        let flat: Vec<f32> = x.view().iter().map(|&v| v as f32).collect();
        DMatrix::from_dense(&flat, x.n_rows()).map_err(|e| native_error(Self::FAMILY, e))
    }
}

impl Backend for XgBoost {
    type Model = Booster;

    const FAMILY: BoostingFamily = BoostingFamily::XgBoost;

    fn train(params: &BoosterParams, task: Task, x: &FeatureMatrix, y: &[f64]) -> TbResult<Booster> {
        let fail = |e: String| native_error(Self::FAMILY, e);

        let mut dtrain = Self::dmatrix(x)?;
        let labels: Vec<f32> = y.iter().map(|&v| v as f32).collect();
        dtrain
            .set_labels(&labels)
            .map_err(|e| native_error(Self::FAMILY, e))?;

        let tree = TreeBoosterParametersBuilder::default()
            .eta(params.learning_rate as f32)
            .max_depth(Self::max_depth(params))
            .max_leaves(params.num_leaves as u32)
            .tree_method(TreeMethod::Hist)
            .lambda(params.reg_lambda as f32)
            .gamma(params.min_split_gain as f32)
            .min_child_weight(params.min_child_weight as f32)
            .subsample(params.subsample as f32)
            .colsample_bytree(params.colsample_bytree as f32)
            .build()
            .map_err(|e| fail(e.to_string()))?;
        let learning = LearningTaskParametersBuilder::default()
            .objective(Self::objective(task))
            .seed(params.random_state)
            .build()
            .map_err(|e| fail(e.to_string()))?;
        let booster_params = BoosterParametersBuilder::default()
            .booster_type(BoosterType::Tree(tree))
            .learning_params(learning)
            .verbose(false)
            .build()
            .map_err(|e| fail(e.to_string()))?;
        let training = TrainingParametersBuilder::default()
            .dtrain(&dtrain)
            .boost_rounds(params.n_estimators as u32)
            .booster_params(booster_params)
            .build()
            .map_err(|e| fail(e.to_string()))?;

        debug!(
            "Training XGBoost: {} rounds, eta {}, max_leaves {}, max_depth {}",
            params.n_estimators,
            params.learning_rate,
            params.num_leaves,
            Self::max_depth(params)
        );
        Booster::train(&training).map_err(|e| native_error(Self::FAMILY, e))
    }

    fn predict(model: &Booster, _task: Task, x: &FeatureMatrix) -> TbResult<Vec<f64>> {
        let dmat = Self::dmatrix(x)?;
        let raw = model
            .predict(&dmat)
            .map_err(|e| native_error(Self::FAMILY, e))?;
        Ok(raw.into_iter().map(f64::from).collect())
    }

    fn split_stats(model: &Booster, n_features: usize) -> TbResult<SplitStats> {
        let dump = model
            .dump_model(true, None)
            .map_err(|e| native_error(Self::FAMILY, e))?;
        Ok(parse_split_stats(&dump, n_features))
    }
}

/// Accumulate split counts and gains from a text dump with statistics,
/// whose split lines read `3:[f1<0.5] yes=7,no=8,missing=7,gain=2.5,cover=40`.
pub fn parse_split_stats(dump: &str, n_features: usize) -> SplitStats {
    let mut stats = SplitStats {
        splits: vec![0.0; n_features],
        gains: vec![0.0; n_features],
    };
    for line in dump.lines() {
        let Some(start) = line.find("[f") else {
            continue;
        };
        let rest = &line[start + 2..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let Ok(feature) = rest[..end].parse::<usize>() else {
            continue;
        };
        if feature >= n_features {
            continue;
        }
        let gain = line
            .find("gain=")
            .and_then(|i| line[i + 5..].split(',').next())
            .and_then(|g| g.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        stats.splits[feature] += 1.0;
        stats.gains[feature] += gain;
    }
    stats
}
