//! Final model training with the best hyperparameters found.

use tb_data::PreparedData;
use tb_model::Estimator;
use tb_optimizer::{ParameterSet, SearchOutcome};
use tb_types::{format_parameters, ordering_error, FeatureList, Table, TbResult};
use tracing::info;

use crate::prediction::{clamp_negative, PredictionSet};

/// A fitted estimator with the schema it was trained on.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    estimator: Box<dyn Estimator>,
    features: FeatureList,
    target: String,
    parameters: ParameterSet,
}

impl TrainedModel {
    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }

    pub fn features(&self) -> &FeatureList {
        &self.features
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Hyperparameters assigned before fitting.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Predict the rows of `table`, which must carry every training feature.
    pub fn predict(&self, table: &Table) -> TbResult<Vec<f64>> {
        let x = table.feature_matrix(&self.features)?;
        self.estimator.predict(&x)
    }

    /// Predictions aligned with the table's index and observed target.
    pub fn predict_table(&self, table: &Table) -> TbResult<PredictionSet> {
        let x = table.feature_matrix(&self.features)?;
        let observed = table.target(&self.target)?;
        let predicted = self.estimator.predict(&x)?;
        let problem = self.estimator.problem();

        let (adjusted, probabilities) = if problem.is_classification() {
            (None, Some(self.estimator.predict_proba(&x)?))
        } else {
            (Some(clamp_negative(&predicted)), None)
        };

        Ok(PredictionSet {
            table: table.name().to_string(),
            target: self.target.clone(),
            problem,
            index: table.index().to_vec(),
            observed,
            predicted,
            adjusted,
            probabilities,
        })
    }

    /// Importance per feature, in feature-list order.
    pub fn feature_importances(&self) -> TbResult<Vec<(String, f64)>> {
        let importances = self.estimator.feature_importances()?;
        Ok(self.features.iter().cloned().zip(importances).collect())
    }
}

/// Fits the final model on the full train sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trainer;

impl Trainer {
    /// Apply the best point of `outcome` by name and fit on the train sample.
    pub fn train(
        estimator: Box<dyn Estimator>,
        outcome: &SearchOutcome,
        data: &PreparedData,
    ) -> TbResult<TrainedModel> {
        let best = outcome.best_parameters().ok_or_else(|| {
            ordering_error!(
                "search {} ({}) holds no evaluated point; run the search before training",
                outcome.id,
                outcome.strategy
            )
        })?;
        Self::train_with(estimator, best, data)
    }

    /// Apply `parameters` by name and fit on the train sample.
    pub fn train_with(
        mut estimator: Box<dyn Estimator>,
        parameters: &ParameterSet,
        data: &PreparedData,
    ) -> TbResult<TrainedModel> {
        estimator.set_params(parameters)?;
        let x = data.train_matrix()?;
        let y = data.train_target()?;
        estimator.fit(&x, &y)?;

        info!(
            "Trained {} on {} rows with {}",
            estimator.family(),
            x.n_rows(),
            format_parameters(parameters)
        );

        Ok(TrainedModel {
            estimator,
            features: data.features().clone(),
            target: data.target().to_string(),
            parameters: parameters.clone(),
        })
    }
}
