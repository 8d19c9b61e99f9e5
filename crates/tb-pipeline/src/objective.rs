//! The cross-validated objective minimised by the search.

use tb_model::{CrossValScorer, Estimator, Scoring};
use tb_optimizer::{Objective, ParameterSet};
use tb_types::{FeatureMatrix, ModelError, TbResult};
use tracing::debug;

/// Assigns a candidate onto the estimator, cross-validates it on the train
/// sample and returns the sign-adjusted mean fold score.
pub struct CrossValidatedObjective<'a> {
    estimator: Box<dyn Estimator>,
    scorer: &'a dyn CrossValScorer,
    x: &'a FeatureMatrix,
    y: &'a [f64],
    scoring: Scoring,
}

impl<'a> CrossValidatedObjective<'a> {
    pub fn new(
        estimator: Box<dyn Estimator>,
        scorer: &'a dyn CrossValScorer,
        x: &'a FeatureMatrix,
        y: &'a [f64],
        scoring: Scoring,
    ) -> Self {
        Self {
            estimator,
            scorer,
            x,
            y,
            scoring,
        }
    }

    /// Estimator holding the most recently assigned parameters.
    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }
}

impl Objective for CrossValidatedObjective<'_> {
    fn evaluate(&mut self, params: &ParameterSet) -> TbResult<f64> {
        self.estimator.set_params(params)?;
        let scores = self
            .scorer
            .cross_val_score(self.estimator.as_ref(), self.x, self.y, self.scoring)?;
        let value = minimisation_value(&scores, self.scoring)?;
        debug!("{} fold scores {:?} -> {:.6}", self.scoring.name(), scores, value);
        Ok(value)
    }
}

/// Mean fold score, negated when higher scores are better.
pub fn minimisation_value(scores: &[f64], scoring: Scoring) -> TbResult<f64> {
    if scores.is_empty() {
        return Err(ModelError::UndefinedScore {
            message: "scorer returned no fold scores".to_string(),
        }
        .into());
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Ok(if scoring.greater_is_better() { -mean } else { mean })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negates_greater_is_better_scores() {
        let value = minimisation_value(&[0.8, 0.9, 1.0], Scoring::RocAuc).unwrap();
        assert!((value + 0.9).abs() < 1e-12);

        // Negative RMSE is also greater-is-better, so the objective is the RMSE.
        let value = minimisation_value(&[-2.0, -4.0], Scoring::NegRootMeanSquaredError).unwrap();
        assert!((value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_scores_are_undefined() {
        assert!(minimisation_value(&[], Scoring::RocAuc).is_err());
    }
}
