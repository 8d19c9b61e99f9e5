//! Booster configuration and parameter assignment by name.

use serde::{Deserialize, Serialize};
use tb_types::{BoostingFamily, ModelError, ObjectiveLabel, ParameterValue, TbResult};

/// How feature importances are accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Number of splits using the feature.
    Split,
    /// Sum of split gains for the feature.
    TotalGain,
    /// Mean split gain for the feature.
    AverageGain,
}

/// Full parameter set of a boosted-tree estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub learning_rate: f64,
    pub n_estimators: usize,
    /// Upper bound on leaves per tree.
    pub num_leaves: usize,
    /// Maximum tree depth; negative means unrestricted.
    pub max_depth: i32,
    pub min_child_samples: usize,
    /// Minimum hessian sum per child.
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    pub min_split_gain: f64,
    /// Row fraction sampled for each tree.
    pub subsample: f64,
    /// Feature fraction sampled for each tree.
    pub colsample_bytree: f64,
    pub max_bins: usize,
    pub random_state: u64,
    pub importance_type: ImportanceType,
    /// Classification objective; `None` infers it from the labels at fit time.
    pub objective: Option<ObjectiveLabel>,
}

impl BoosterParams {
    /// Baseline for leaf-wise boosting.
    pub fn lightgbm_defaults() -> Self {
        Self {
            learning_rate: 0.1,
            n_estimators: 100,
            num_leaves: 31,
            max_depth: -1,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            reg_lambda: 0.0,
            min_split_gain: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bins: 255,
            random_state: 42,
            importance_type: ImportanceType::TotalGain,
            objective: None,
        }
    }

    /// Baseline for level-wise boosting.
    pub fn xgboost_defaults() -> Self {
        Self {
            learning_rate: 0.3,
            n_estimators: 100,
            num_leaves: 64,
            max_depth: -1,
            min_child_samples: 1,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            min_split_gain: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bins: 256,
            random_state: 42,
            importance_type: ImportanceType::TotalGain,
            objective: None,
        }
    }

    /// Assign one parameter by name.
    ///
    /// Both families accept the same names; `max_leaves`, `lambda`,
    /// `reg_lambda`, `gamma` and `seed` are accepted as aliases.
    pub fn set(&mut self, family: BoostingFamily, name: &str, value: &ParameterValue) -> TbResult<()> {
        match name {
            "learning_rate" | "eta" => {
                let v = positive_f64(name, value)?;
                self.learning_rate = v;
            }
            "n_estimators" => self.n_estimators = int_at_least(name, value, 1)? as usize,
            "num_leaves" | "max_leaves" => self.num_leaves = int_at_least(name, value, 2)? as usize,
            "max_depth" => {
                let v = int_value(name, value)?;
                self.max_depth = i32::try_from(v).map_err(|_| invalid(name, "out of range"))?;
            }
            "min_child_samples" => {
                self.min_child_samples = int_at_least(name, value, 1)? as usize
            }
            "min_child_weight" | "min_sum_hessian_in_leaf" => {
                self.min_child_weight = non_negative_f64(name, value)?
            }
            "reg_lambda" | "lambda" | "lambda_l2" => self.reg_lambda = non_negative_f64(name, value)?,
            "min_split_gain" | "gamma" => self.min_split_gain = non_negative_f64(name, value)?,
            "subsample" => self.subsample = fraction(name, value)?,
            "colsample_bytree" => self.colsample_bytree = fraction(name, value)?,
            "max_bins" | "max_bin" => self.max_bins = int_at_least(name, value, 2)? as usize,
            "random_state" | "seed" => self.random_state = int_at_least(name, value, 0)? as u64,
            "objective" => {
                let label = match value {
                    ParameterValue::Json(serde_json::Value::String(s)) => s.parse()?,
                    _ => return Err(invalid(name, "expected an objective name")),
                };
                self.objective = Some(label);
            }
            _ => {
                return Err(ModelError::UnknownParameter {
                    name: name.to_string(),
                    family: family.to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// Depth limit as an `Option`, `None` when unrestricted.
    pub fn depth_limit(&self) -> Option<usize> {
        usize::try_from(self.max_depth).ok().filter(|d| *d > 0)
    }
}

fn invalid(name: &str, message: &str) -> tb_types::TbError {
    ModelError::InvalidParameter {
        name: name.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn float_value(name: &str, value: &ParameterValue) -> TbResult<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(name, &format!("expected a finite number, got {value}")))
}

fn positive_f64(name: &str, value: &ParameterValue) -> TbResult<f64> {
    let v = float_value(name, value)?;
    if v <= 0.0 {
        return Err(invalid(name, &format!("must be positive, got {v}")));
    }
    Ok(v)
}

fn non_negative_f64(name: &str, value: &ParameterValue) -> TbResult<f64> {
    let v = float_value(name, value)?;
    if v < 0.0 {
        return Err(invalid(name, &format!("must be non-negative, got {v}")));
    }
    Ok(v)
}

fn fraction(name: &str, value: &ParameterValue) -> TbResult<f64> {
    let v = float_value(name, value)?;
    if !(v > 0.0 && v <= 1.0) {
        return Err(invalid(name, &format!("must lie in (0, 1], got {v}")));
    }
    Ok(v)
}

fn int_value(name: &str, value: &ParameterValue) -> TbResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| invalid(name, &format!("expected an integer, got {value}")))
}

fn int_at_least(name: &str, value: &ParameterValue, min: i64) -> TbResult<i64> {
    let v = int_value(name, value)?;
    if v < min {
        return Err(invalid(name, &format!("must be at least {min}, got {v}")));
    }
    Ok(v)
}
