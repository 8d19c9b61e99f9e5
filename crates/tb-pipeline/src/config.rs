//! Pipeline configuration, loadable from JSON with environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tb_data::PreparationConfig;
use tb_optimizer::{CallBudget, ParameterSet, SearchMethod};
use tb_types::{config_error, TbResult};
use tracing::info;

/// Overrides the output directory.
pub const ENV_OUTPUT_DIR: &str = "TUNEBOOST_OUTPUT_DIR";
/// Overrides the number of objective evaluations.
pub const ENV_CALL_BUDGET: &str = "TUNEBOOST_CALL_BUDGET";

/// Settings for the hyperparameter search stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Strategy name, e.g. "random_search" or "bayesian".
    pub strategy: String,
    /// Total objective evaluations, initial points included.
    pub call_budget: usize,
    /// Points evaluated before the strategy is consulted.
    pub initial_points: Vec<ParameterSet>,
    pub seed: u64,
    /// Cross-validation folds per evaluation.
    pub folds: usize,
    /// Fit folds in parallel.
    pub parallel_folds: bool,
    /// Wall-clock limit; the search stops early once it passes.
    pub max_duration_secs: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: SearchMethod::RandomSearch.as_str().to_string(),
            call_budget: 100,
            initial_points: Vec::new(),
            seed: 42,
            folds: 5,
            parallel_folds: true,
            max_duration_secs: None,
        }
    }
}

impl SearchConfig {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            ..Self::default()
        }
    }

    pub fn with_call_budget(mut self, call_budget: usize) -> Self {
        self.call_budget = call_budget;
        self
    }

    pub fn with_initial_points(mut self, points: Vec<ParameterSet>) -> Self {
        self.initial_points = points;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_parallel_folds(mut self, parallel: bool) -> Self {
        self.parallel_folds = parallel;
        self
    }

    pub fn with_max_duration_secs(mut self, secs: u64) -> Self {
        self.max_duration_secs = Some(secs);
        self
    }

    /// Parse the strategy name.
    pub fn method(&self) -> TbResult<SearchMethod> {
        self.strategy.parse()
    }

    pub fn budget(&self) -> CallBudget {
        let budget = CallBudget::new(self.call_budget);
        match self.max_duration_secs {
            Some(secs) => budget.with_max_duration(Duration::from_secs(secs)),
            None => budget,
        }
    }

    pub fn validate(&self) -> TbResult<()> {
        self.method()?;
        if self.call_budget == 0 {
            return Err(config_error!("call_budget must be at least 1"));
        }
        if self.folds < 2 {
            return Err(config_error!("folds must be at least 2, got {}", self.folds));
        }
        Ok(())
    }
}

/// Everything a pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub preparation: PreparationConfig,
    /// Estimator family name, e.g. "lightgbm" or "xgboost".
    #[serde(default = "default_family")]
    pub family: String,
    /// Classification objective name; ignored for regression.
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub search: SearchConfig,
    /// Directory receiving the search state and prediction exports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_family() -> String {
    "lightgbm".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl PipelineConfig {
    pub fn new(
        train_path: impl Into<PathBuf>,
        test_path: impl Into<PathBuf>,
        preparation: PreparationConfig,
    ) -> Self {
        Self {
            train_path: train_path.into(),
            test_path: test_path.into(),
            preparation,
            family: default_family(),
            objective: None,
            search: SearchConfig::default(),
            output_dir: default_output_dir(),
        }
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Read a JSON config file and apply environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TbResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config: PipelineConfig = serde_json::from_str(&content)?;
        config.apply_overrides_from(|key| std::env::var(key).ok())?;
        info!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> TbResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_CALL_BUDGET) {
            self.search.call_budget = raw
                .trim()
                .parse()
                .map_err(|_| config_error!("{} must be a positive integer, got '{}'", ENV_CALL_BUDGET, raw))?;
        }
        Ok(())
    }
}
