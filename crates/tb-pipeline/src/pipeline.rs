//! Stage-by-stage facade: prepare, select, search, train.

use std::path::{Path, PathBuf};

use tb_data::{DataPreparation, PreparedData};
use tb_model::{Estimator, ModelSelector};
use tb_optimizer::{CancellationToken, SearchOutcome, SearchSpace};
use tb_types::{Table, TbResult};
use tracing::info;

use crate::config::PipelineConfig;
use crate::prediction::PredictionSet;
use crate::search::HyperparameterSearch;
use crate::trainer::{TrainedModel, Trainer};

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub data: PreparedData,
    pub outcome: SearchOutcome,
    /// Location of the persisted search state.
    pub state_path: PathBuf,
    pub model: TrainedModel,
    /// Predictions of the trained model on the test sample.
    pub test_predictions: PredictionSet,
}

/// Runs the four stages in order, each taking its predecessor's output.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    search: HyperparameterSearch,
}

impl Pipeline {
    /// Validates names and settings up front; nothing is loaded yet.
    pub fn new(config: PipelineConfig) -> TbResult<Self> {
        let search = HyperparameterSearch::new(config.search.clone())?;
        // Parse family and objective early so a typo fails before loading data.
        ModelSelector::select_by_name(
            config.preparation.problem,
            &config.family,
            config.objective.as_deref(),
        )?;
        Ok(Self { config, search })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> TbResult<Self> {
        Self::new(PipelineConfig::from_file(path)?)
    }

    pub fn with_space(mut self, space: SearchSpace) -> Self {
        self.search = self.search.with_space(space);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.search = self.search.with_cancellation(token);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn search(&self) -> &HyperparameterSearch {
        &self.search
    }

    /// Load train and test from the configured paths and prepare them.
    pub fn prepare(&self) -> TbResult<PreparedData> {
        DataPreparation::new(self.config.preparation.clone())
            .prepare_paths(&self.config.train_path, &self.config.test_path)
    }

    /// Prepare in-memory tables instead of reading the configured paths.
    pub fn prepare_tables(&self, train: Table, test: Table) -> TbResult<PreparedData> {
        DataPreparation::new(self.config.preparation.clone()).prepare(train, test)
    }

    /// A fresh, untrained estimator for the configured family.
    pub fn select_estimator(&self) -> TbResult<Box<dyn Estimator>> {
        ModelSelector::select_by_name(
            self.config.preparation.problem,
            &self.config.family,
            self.config.objective.as_deref(),
        )
    }

    /// Run every stage from the configured paths.
    pub fn run(&self) -> TbResult<PipelineRun> {
        let data = self.prepare()?;
        self.run_prepared(data)
    }

    /// Select, search and train on already prepared data.
    pub fn run_prepared(&self, data: PreparedData) -> TbResult<PipelineRun> {
        let estimator = self.select_estimator()?;
        let scorer = self.search.scorer();
        let (outcome, state_path) = self.search.run_and_persist(
            estimator.as_ref(),
            &data,
            &scorer,
            &self.config.output_dir,
        )?;

        let model = Trainer::train(estimator, &outcome, &data)?;
        let test_predictions = model.predict_table(data.test())?;
        info!(
            "Pipeline finished: {} evaluations, {} test predictions",
            outcome.trace.len(),
            test_predictions.len()
        );

        Ok(PipelineRun {
            data,
            outcome,
            state_path,
            model,
            test_predictions,
        })
    }
}
