//! Gradient-boosted tree estimators for TuneBoost.
//!
//! Two families train through native boosting libraries:
//! - [`LeafWiseBooster`] wraps LightGBM, growing each tree leaf by leaf up to
//!   `num_leaves`
//! - [`DepthWiseBooster`] wraps XGBoost's histogram method, growing level by
//!   level with L2-regularised leaves
//!
//! [`ModelSelector`] builds fresh estimators, [`KFoldScorer`] scores them
//! with k-fold cross-validation.

pub mod depthwise;
pub mod estimator;
pub mod families;
pub mod labels;
pub mod leafwise;
pub mod metrics;
pub mod native;
pub mod params;
pub mod selector;
pub mod validation;

pub use depthwise::XgBoost;
pub use estimator::Estimator;
pub use families::{DepthWiseBooster, LeafWiseBooster};
pub use labels::{LabelEncoder, Task};
pub use leafwise::LightGbm;
pub use native::{Backend, NativeModel, SplitStats};
pub use params::{BoosterParams, ImportanceType};
pub use selector::ModelSelector;
pub use validation::{kfold, stratified_kfold, CrossValScorer, Fold, KFoldScorer, Scoring};
