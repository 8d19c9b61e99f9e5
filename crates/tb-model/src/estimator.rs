use std::fmt;

use tb_types::{
    BoostingFamily, FeatureMatrix, ParameterSet, ParameterValue, ProblemKind, TbResult,
};

use crate::params::BoosterParams;

/// A configurable, fittable boosted-tree model.
///
/// Parameters are assigned by name, so callers never depend on the order in
/// which a search space lists its dimensions.
pub trait Estimator: Send + Sync + fmt::Debug {
    fn family(&self) -> BoostingFamily;

    fn problem(&self) -> ProblemKind;

    fn params(&self) -> &BoosterParams;

    /// Assign one named parameter, failing on unknown names or bad values.
    fn set_param(&mut self, name: &str, value: &ParameterValue) -> TbResult<()>;

    fn set_params(&mut self, params: &ParameterSet) -> TbResult<()> {
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> TbResult<()>;

    fn is_fitted(&self) -> bool;

    /// Class labels for classification, values for regression.
    fn predict(&self, x: &FeatureMatrix) -> TbResult<Vec<f64>>;

    /// Per-row class probabilities; classification only.
    fn predict_proba(&self, x: &FeatureMatrix) -> TbResult<Vec<Vec<f64>>>;

    /// Class labels seen at fit time, in `predict_proba` column order;
    /// `None` for regression or before fitting.
    fn classes(&self) -> Option<&[f64]>;

    fn n_classes(&self) -> Option<usize> {
        self.classes().map(<[f64]>::len)
    }

    fn feature_importances(&self) -> TbResult<Vec<f64>>;

    fn clone_box(&self) -> Box<dyn Estimator>;
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
