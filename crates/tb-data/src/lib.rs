//! # tb-data
//!
//! Sample loading and preparation for TuneBoost: CSV and Parquet table
//! loaders, feature-list artifacts, and a min-max scaler fitted on the
//! training table only.

pub mod loaders;
pub mod preparation;
pub mod scaling;

pub use loaders::*;
pub use preparation::*;
pub use scaling::*;
