//! The two interchangeable estimator families.

use std::fmt;
use std::marker::PhantomData;

use tb_types::{
    internal_error, validation_error, BoostingFamily, FeatureMatrix, ModelError, ParameterValue,
    ProblemKind, TbResult,
};
use tracing::debug;

use crate::depthwise::XgBoost;
use crate::estimator::Estimator;
use crate::labels::{LabelEncoder, Task};
use crate::leafwise::LightGbm;
use crate::native::{Backend, NativeModel};
use crate::params::{BoosterParams, ImportanceType};

/// What `fit` leaves behind.
struct Fitted<B: Backend> {
    model: NativeModel<B::Model>,
    task: Task,
    labels: Option<LabelEncoder>,
}

impl<B: Backend> Clone for Fitted<B> {
    fn clone(&self) -> Self {
        Self {
            model: self.model.clone(),
            task: self.task,
            labels: self.labels.clone(),
        }
    }
}

/// State common to both families.
struct BoosterCore<B: Backend> {
    problem: ProblemKind,
    params: BoosterParams,
    fitted: Option<Fitted<B>>,
    backend: PhantomData<B>,
}

impl<B: Backend> Clone for BoosterCore<B> {
    fn clone(&self) -> Self {
        Self {
            problem: self.problem,
            params: self.params.clone(),
            fitted: self.fitted.clone(),
            backend: PhantomData,
        }
    }
}

impl<B: Backend> fmt::Debug for BoosterCore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoosterCore")
            .field("family", &B::FAMILY)
            .field("problem", &self.problem)
            .field("params", &self.params)
            .field("task", &self.fitted.as_ref().map(|fit| fit.task))
            .finish()
    }
}

impl<B: Backend> BoosterCore<B> {
    fn new(problem: ProblemKind, params: BoosterParams) -> Self {
        Self {
            problem,
            params,
            fitted: None,
            backend: PhantomData,
        }
    }

    fn family(&self) -> BoostingFamily {
        B::FAMILY
    }

    fn fitted(&self) -> TbResult<&Fitted<B>> {
        self.fitted.as_ref().ok_or_else(|| ModelError::NotFitted.into())
    }

    fn set_param(&mut self, name: &str, value: &ParameterValue) -> TbResult<()> {
        self.params.set(B::FAMILY, name, value)
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> TbResult<()> {
        if x.n_rows() != y.len() {
            return Err(validation_error!(
                "feature matrix has {} rows but the target has {}",
                x.n_rows(),
                y.len()
            ));
        }
        if x.n_rows() == 0 {
            return Err(ModelError::TrainingFailed {
                message: "no training rows".to_string(),
            }
            .into());
        }

        let (task, labels, encoded) = match self.problem {
            ProblemKind::Regression => (Task::Regression, None, y.to_vec()),
            ProblemKind::Classification => {
                let labels = LabelEncoder::fit(y)?;
                let task = Task::resolve(self.problem, self.params.objective, labels.n_classes())?;
                let encoded = labels.encode(y)?;
                (task, Some(labels), encoded)
            }
        };

        let model = B::train(&self.params, task, x, &encoded)?;
        debug!(
            "Fitted {} {:?} on {} rows x {} features",
            B::FAMILY,
            task,
            x.n_rows(),
            x.n_cols()
        );
        self.fitted = Some(Fitted {
            model: NativeModel::new(model, x.n_cols()),
            task,
            labels,
        });
        Ok(())
    }

    /// Native outputs, checked against the expected shape.
    fn raw_outputs(&self, fitted: &Fitted<B>, x: &FeatureMatrix) -> TbResult<Vec<f64>> {
        let expected = fitted.model.n_features();
        if x.n_cols() != expected {
            return Err(ModelError::ShapeMismatch {
                expected,
                actual: x.n_cols(),
            }
            .into());
        }
        if x.n_rows() == 0 {
            return Ok(Vec::new());
        }
        let raw = fitted.model.with(|model| B::predict(model, fitted.task, x))?;
        let width = fitted.task.outputs_per_row();
        if raw.len() != x.n_rows() * width {
            return Err(internal_error!(
                "{} returned {} outputs for {} rows of width {}",
                B::FAMILY,
                raw.len(),
                x.n_rows(),
                width
            ));
        }
        Ok(raw)
    }

    fn probabilities(&self, fitted: &Fitted<B>, x: &FeatureMatrix) -> TbResult<Vec<Vec<f64>>> {
        let raw = self.raw_outputs(fitted, x)?;
        match fitted.task {
            Task::Binary => Ok(raw.into_iter().map(|p| vec![1.0 - p, p]).collect()),
            Task::Multiclass { n_classes } => {
                Ok(raw.chunks(n_classes).map(<[f64]>::to_vec).collect())
            }
            Task::Regression => Err(self.no_probabilities()),
        }
    }

    fn no_probabilities(&self) -> tb_types::TbError {
        ModelError::Unsupported {
            operation: "predict_proba".to_string(),
            problem: self.problem.to_string(),
        }
        .into()
    }

    fn predict(&self, x: &FeatureMatrix) -> TbResult<Vec<f64>> {
        let fitted = self.fitted()?;
        let Some(labels) = &fitted.labels else {
            return self.raw_outputs(fitted, x);
        };
        self.probabilities(fitted, x)?
            .iter()
            .map(|p| {
                let id = argmax(p);
                labels
                    .decode(id)
                    .ok_or_else(|| internal_error!("class id {} outside the fitted labels", id))
            })
            .collect()
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> TbResult<Vec<Vec<f64>>> {
        if self.problem == ProblemKind::Regression {
            return Err(self.no_probabilities());
        }
        self.probabilities(self.fitted()?, x)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.fitted
            .as_ref()
            .and_then(|fit| fit.labels.as_ref())
            .map(LabelEncoder::classes)
    }

    fn feature_importances(&self) -> TbResult<Vec<f64>> {
        let fitted = self.fitted()?;
        let n_features = fitted.model.n_features();
        let stats = fitted
            .model
            .with(|model| B::split_stats(model, n_features))?;
        Ok(match self.params.importance_type {
            ImportanceType::Split => stats.splits,
            ImportanceType::TotalGain => stats.gains,
            ImportanceType::AverageGain => stats
                .gains
                .iter()
                .zip(&stats.splits)
                .map(|(&g, &n)| if n > 0.0 { g / n } else { 0.0 })
                .collect(),
        })
    }
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

macro_rules! booster_estimator {
    ($name:ident) => {
        impl Estimator for $name {
            fn family(&self) -> BoostingFamily {
                self.0.family()
            }

            fn problem(&self) -> ProblemKind {
                self.0.problem
            }

            fn params(&self) -> &BoosterParams {
                &self.0.params
            }

            fn set_param(&mut self, name: &str, value: &ParameterValue) -> TbResult<()> {
                self.0.set_param(name, value)
            }

            fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> TbResult<()> {
                self.0.fit(x, y)
            }

            fn is_fitted(&self) -> bool {
                self.0.fitted.is_some()
            }

            fn predict(&self, x: &FeatureMatrix) -> TbResult<Vec<f64>> {
                self.0.predict(x)
            }

            fn predict_proba(&self, x: &FeatureMatrix) -> TbResult<Vec<Vec<f64>>> {
                self.0.predict_proba(x)
            }

            fn classes(&self) -> Option<&[f64]> {
                self.0.classes()
            }

            fn feature_importances(&self) -> TbResult<Vec<f64>> {
                self.0.feature_importances()
            }

            fn clone_box(&self) -> Box<dyn Estimator> {
                Box::new(self.clone())
            }
        }
    };
}

/// Family A: LightGBM, leaf-wise growth bounded by `num_leaves`.
#[derive(Debug, Clone)]
pub struct LeafWiseBooster(BoosterCore<LightGbm>);

impl LeafWiseBooster {
    pub fn new(problem: ProblemKind) -> Self {
        Self::with_params(problem, BoosterParams::lightgbm_defaults())
    }

    pub fn with_params(problem: ProblemKind, params: BoosterParams) -> Self {
        Self(BoosterCore::new(problem, params))
    }
}

booster_estimator!(LeafWiseBooster);

/// Family B: XGBoost, depth-wise histogram growth with L2-regularised
/// leaves; `num_leaves` caps the leaves per tree.
#[derive(Debug, Clone)]
pub struct DepthWiseBooster(BoosterCore<XgBoost>);

impl DepthWiseBooster {
    pub fn new(problem: ProblemKind) -> Self {
        Self::with_params(problem, BoosterParams::xgboost_defaults())
    }

    pub fn with_params(problem: ProblemKind, params: BoosterParams) -> Self {
        Self(BoosterCore::new(problem, params))
    }
}

booster_estimator!(DepthWiseBooster);
