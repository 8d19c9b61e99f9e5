//! # tb-optimizer
//!
//! Black-box hyperparameter search for TuneBoost.
//!
//! Provides search space definitions, four search strategies (random and
//! three surrogate-model strategies), the minimisation loop with call budget
//! and cancellation, trial tracking, and search-state persistence.

mod budget;
mod minimize;
mod persist;
mod space;
mod strategy;
pub mod surrogate;
mod trial;

pub use budget::{CallBudget, CancellationToken, StopReason};
pub use minimize::{minimize, MinimizeConfig, Objective};
pub use persist::{load_outcome, save_outcome, state_file_name};
pub use space::{ParameterDef, ParameterKind, SearchSpace};
pub use strategy::{RandomSearch, SearchMethod, SearchStrategy};
pub use surrogate::{
    expected_improvement, ExtraTreesForest, GaussianProcess, QuantileBoosting, Surrogate,
    SurrogateConfig, SurrogateSearch,
};
pub use tb_types::{ParameterSet, ParameterValue};
pub use trial::{OptimizationState, SearchId, SearchOutcome, SearchTrace, Trial};
