//! Hyperparameter search stage.

use std::path::{Path, PathBuf};

use tb_data::PreparedData;
use tb_model::{CrossValScorer, Estimator, KFoldScorer, Scoring};
use tb_optimizer::{
    minimize, save_outcome, CancellationToken, MinimizeConfig, SearchMethod, SearchOutcome,
    SearchSpace,
};
use tb_types::{format_parameters, TbResult};
use tracing::info;

use crate::config::SearchConfig;
use crate::objective::CrossValidatedObjective;

/// Runs one of the four strategies against a cross-validated objective.
///
/// The strategy name is parsed on construction, so an unknown name fails
/// before any data is touched or any fold is scored.
#[derive(Debug, Clone)]
pub struct HyperparameterSearch {
    method: SearchMethod,
    config: SearchConfig,
    space: SearchSpace,
    cancel: Option<CancellationToken>,
}

impl HyperparameterSearch {
    pub fn new(config: SearchConfig) -> TbResult<Self> {
        config.validate()?;
        let method = config.method()?;
        Ok(Self {
            method,
            config,
            space: SearchSpace::boosting(),
            cancel: None,
        })
    }

    /// Search a different space than the boosting default.
    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn method(&self) -> SearchMethod {
        self.method
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// K-fold scorer matching the configured folds.
    pub fn scorer(&self) -> KFoldScorer {
        KFoldScorer::new(self.config.folds).with_parallel(self.config.parallel_folds)
    }

    /// Minimise the cross-validated objective on the train sample.
    ///
    /// `estimator` is cloned; the caller's instance is left untouched.
    pub fn run(
        &self,
        estimator: &dyn Estimator,
        data: &PreparedData,
        scorer: &dyn CrossValScorer,
    ) -> TbResult<SearchOutcome> {
        let x = data.train_matrix()?;
        let y = data.train_target()?;
        let scoring = Scoring::for_problem(data.problem());

        info!(
            "Searching {} {} with {} ({} calls, {} scoring)",
            estimator.family(),
            data.problem(),
            self.method,
            self.config.call_budget,
            scoring.name()
        );

        let mut strategy = self.method.build(self.space.clone(), self.config.seed)?;
        let mut objective =
            CrossValidatedObjective::new(estimator.clone_box(), scorer, &x, &y, scoring);

        let mut budget = self.config.budget();
        if let Some(token) = &self.cancel {
            budget = budget.with_cancellation(token.clone());
        }
        let minimize_config =
            MinimizeConfig::new(budget).with_initial_points(self.config.initial_points.clone());

        let outcome = minimize(&mut objective, &self.space, strategy.as_mut(), &minimize_config)?;

        match (outcome.best_parameters(), outcome.best_objective()) {
            (Some(best), Some(value)) => info!(
                "Optimal hyperparameters after {} evaluations: {} (objective {:.6})",
                outcome.trace.len(),
                format_parameters(best),
                value
            ),
            _ => info!("Search stopped before any evaluation"),
        }
        Ok(outcome)
    }

    /// [`HyperparameterSearch::run`], then save the outcome as
    /// `optimization_data_<target>.json` under `output_dir`.
    pub fn run_and_persist(
        &self,
        estimator: &dyn Estimator,
        data: &PreparedData,
        scorer: &dyn CrossValScorer,
        output_dir: &Path,
    ) -> TbResult<(SearchOutcome, PathBuf)> {
        let outcome = self.run(estimator, data, scorer)?;
        let path = save_outcome(output_dir, data.target(), &outcome)?;
        Ok((outcome, path))
    }
}
