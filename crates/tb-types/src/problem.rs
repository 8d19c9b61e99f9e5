use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TbError;

/// Whether the target is a class label or a continuous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    Classification,
    Regression,
}

impl ProblemKind {
    pub fn is_classification(&self) -> bool {
        matches!(self, ProblemKind::Classification)
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemKind::Classification => write!(f, "classification"),
            ProblemKind::Regression => write!(f, "regression"),
        }
    }
}

impl FromStr for ProblemKind {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(ProblemKind::Classification),
            "regression" => Ok(ProblemKind::Regression),
            other => Err(TbError::Config(format!("Unknown problem kind: {other}"))),
        }
    }
}

/// Gradient-boosted tree family used to build the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostingFamily {
    /// Leaf-wise growth bounded by the number of leaves (LightGBM style).
    LightGbm,
    /// Level-wise growth with L2-regularised leaf weights (XGBoost style).
    XgBoost,
}

impl BoostingFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostingFamily::LightGbm => "lightgbm",
            BoostingFamily::XgBoost => "xgboost",
        }
    }
}

impl fmt::Display for BoostingFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoostingFamily {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lightgbm" | "light_gbm" | "leafwise" => Ok(BoostingFamily::LightGbm),
            "xgboost" | "xg_boost" | "depthwise" => Ok(BoostingFamily::XgBoost),
            other => Err(TbError::Config(format!("Unknown boosting family: {other}"))),
        }
    }
}

/// Classification objective requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveLabel {
    /// Two classes, logistic loss on a single raw score.
    Binary,
    /// K classes, softmax over one raw score per class.
    Multiclass,
}

impl fmt::Display for ObjectiveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectiveLabel::Binary => write!(f, "binary"),
            ObjectiveLabel::Multiclass => write!(f, "multiclass"),
        }
    }
}

impl FromStr for ObjectiveLabel {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "binary:logistic" => Ok(ObjectiveLabel::Binary),
            "multiclass" | "multi:softprob" | "multi:softmax" | "softmax" => {
                Ok(ObjectiveLabel::Multiclass)
            }
            other => Err(TbError::Config(format!("Unknown objective: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_family_aliases() {
        assert_eq!("lightGBM".parse::<BoostingFamily>().unwrap(), BoostingFamily::LightGbm);
        assert_eq!("XGBoost".parse::<BoostingFamily>().unwrap(), BoostingFamily::XgBoost);
        assert_eq!("depthwise".parse::<BoostingFamily>().unwrap(), BoostingFamily::XgBoost);
    }

    #[test]
    fn unknown_family_is_config_error() {
        let err = "catboost".parse::<BoostingFamily>().unwrap_err();
        assert!(matches!(err, TbError::Config(_)));
    }

    #[test]
    fn parses_objective_aliases() {
        assert_eq!("binary".parse::<ObjectiveLabel>().unwrap(), ObjectiveLabel::Binary);
        assert_eq!(
            "multi:softprob".parse::<ObjectiveLabel>().unwrap(),
            ObjectiveLabel::Multiclass
        );
        assert!("poisson".parse::<ObjectiveLabel>().is_err());
    }

    #[test]
    fn problem_kind_round_trip_through_display() {
        for kind in [ProblemKind::Classification, ProblemKind::Regression] {
            assert_eq!(kind.to_string().parse::<ProblemKind>().unwrap(), kind);
        }
        assert!("ranking".parse::<ProblemKind>().is_err());
    }
}
