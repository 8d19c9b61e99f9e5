use thiserror::Error;

/// Main error type for TuneBoost
#[derive(Error, Debug)]
pub enum TbError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ordering error: {0}")]
    Ordering(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while loading and preparing samples
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Column '{column}' not found in {table} table")]
    MissingColumn { column: String, table: String },

    #[error("Duplicate column '{column}'")]
    DuplicateColumn { column: String },

    #[error("Feature list is empty")]
    EmptyFeatureList,

    #[error("Feature '{feature}' listed more than once")]
    DuplicateFeature { feature: String },

    #[error("Target column '{column}' is also listed as a feature")]
    TargetInFeatures { column: String },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value in column '{column}' at row {row}")]
    NonFinite { column: String, row: usize },

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Table is empty: {table}")]
    EmptyTable { table: String },
}

/// Errors raised by estimators and scorers
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown parameter '{name}' for {family} estimator")]
    UnknownParameter { name: String, family: String },

    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Estimator has not been fitted")]
    NotFitted,

    #[error("Invalid class label {label}: labels must be whole numbers")]
    InvalidLabel { label: f64 },

    #[error("Feature matrix has {actual} columns, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Operation '{operation}' is not supported for {problem}")]
    Unsupported { operation: String, problem: String },

    #[error("Score is undefined: {message}")]
    UndefinedScore { message: String },

    #[error("Training failed: {message}")]
    TrainingFailed { message: String },
}

/// Errors raised by the hyperparameter search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search space is empty")]
    EmptySpace,

    #[error("Invalid dimension '{name}': {message}")]
    InvalidDimension { name: String, message: String },

    #[error("Initial point {index} is invalid: {message}")]
    InvalidInitialPoint { index: usize, message: String },

    #[error("Call budget must be at least 1, got {0}")]
    InvalidBudget(usize),

    #[error("Objective returned a non-finite value for {params}")]
    NonFiniteObjective { params: String },

    #[error("Surrogate model failed: {message}")]
    SurrogateFailed { message: String },
}

/// Result type alias for TuneBoost operations
pub type TbResult<T> = Result<T, TbError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::TbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::TbError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::TbError::Config(format!($($arg)*))
    };
}

/// Macro for creating stage ordering errors
#[macro_export]
macro_rules! ordering_error {
    ($($arg:tt)*) => {
        $crate::TbError::Ordering(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DataError::MissingColumn {
            column: "band_gap".to_string(),
            table: "test".to_string(),
        };

        assert!(error.to_string().contains("band_gap"));
        assert!(error.to_string().contains("test table"));
    }

    #[test]
    fn test_error_conversion() {
        let model_error = ModelError::NotFitted;
        let tb_error: TbError = model_error.into();

        match tb_error {
            TbError::Model(ModelError::NotFitted) => (),
            _ => panic!("Expected Model error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(matches!(validation_err, TbError::Validation(_)));
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, TbError::Internal(_)));
        let config_err = config_error!("Unknown strategy: {}", "annealing");
        assert_eq!(config_err.to_string(), "Configuration error: Unknown strategy: annealing");
        let ordering_err = ordering_error!("train before search");
        assert!(matches!(ordering_err, TbError::Ordering(_)));
    }
}
