//! # tb-pipeline
//!
//! Orchestrates a TuneBoost run: Data Preparation, Model Selector,
//! Hyperparameter Search and Trainer, each stage taking its predecessor's
//! output explicitly.
//!
//! ```no_run
//! use tb_pipeline::{init_tracing, Pipeline};
//!
//! # fn main() -> tb_types::TbResult<()> {
//! init_tracing();
//! let run = Pipeline::from_file("pipeline.json")?.run()?;
//! println!("best: {:?}", run.outcome.best_parameters());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod objective;
pub mod pipeline;
pub mod prediction;
pub mod search;
pub mod telemetry;
pub mod trainer;

pub use config::{PipelineConfig, SearchConfig, ENV_CALL_BUDGET, ENV_OUTPUT_DIR};
pub use objective::{minimisation_value, CrossValidatedObjective};
pub use pipeline::{Pipeline, PipelineRun};
pub use prediction::{clamp_negative, PredictionSet};
pub use search::HyperparameterSearch;
pub use telemetry::init_tracing;
pub use trainer::{TrainedModel, Trainer};
