//! Data preparation: resolve features, validate the schema, scale.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tb_types::{
    DataError, FeatureList, FeatureMatrix, ModelError, ProblemKind, Table, TbResult,
};
use tracing::info;

use crate::loaders::{load_feature_list, LoadOptions, TableLoader};
use crate::scaling::MinMaxScaler;

/// Where the feature list comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    /// Literal column names.
    List(Vec<String>),
    /// JSON artifact holding an array of column names.
    Artifact(PathBuf),
}

impl FeatureSource {
    pub fn resolve(&self) -> TbResult<FeatureList> {
        match self {
            FeatureSource::List(names) => FeatureList::new(names.clone()),
            FeatureSource::Artifact(path) => load_feature_list(path),
        }
    }
}

/// Settings for the data preparation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationConfig {
    pub target: String,
    pub features: FeatureSource,
    /// When true the feature columns are already scaled and left untouched.
    pub scaled: bool,
    pub problem: ProblemKind,
    #[serde(default)]
    pub load_options: LoadOptions,
}

impl PreparationConfig {
    pub fn new(target: impl Into<String>, features: FeatureSource, problem: ProblemKind) -> Self {
        Self {
            target: target.into(),
            features,
            scaled: false,
            problem,
            load_options: LoadOptions::default(),
        }
    }

    pub fn with_scaled(mut self, scaled: bool) -> Self {
        self.scaled = scaled;
        self
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }
}

/// Train and test samples ready for model selection and search.
#[derive(Debug, Clone)]
pub struct PreparedData {
    train: Table,
    test: Table,
    features: FeatureList,
    target: String,
    problem: ProblemKind,
    scaler: Option<MinMaxScaler>,
}

impl PreparedData {
    pub fn train(&self) -> &Table {
        &self.train
    }

    pub fn test(&self) -> &Table {
        &self.test
    }

    pub fn features(&self) -> &FeatureList {
        &self.features
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn problem(&self) -> ProblemKind {
        self.problem
    }

    /// The scaler fitted on train, if scaling was applied.
    pub fn scaler(&self) -> Option<&MinMaxScaler> {
        self.scaler.as_ref()
    }

    pub fn train_matrix(&self) -> TbResult<FeatureMatrix> {
        self.train.feature_matrix(&self.features)
    }

    pub fn train_target(&self) -> TbResult<Vec<f64>> {
        self.train.target(&self.target)
    }

    pub fn test_matrix(&self) -> TbResult<FeatureMatrix> {
        self.test.feature_matrix(&self.features)
    }

    pub fn test_target(&self) -> TbResult<Vec<f64>> {
        self.test.target(&self.target)
    }
}

/// Runs the data preparation stage.
#[derive(Debug, Clone)]
pub struct DataPreparation {
    config: PreparationConfig,
}

impl DataPreparation {
    pub fn new(config: PreparationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }

    /// Load both tables from disk and prepare them.
    pub fn prepare_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        train_path: P,
        test_path: Q,
    ) -> TbResult<PreparedData> {
        let loader = TableLoader::new(self.config.load_options.clone());
        let train = loader.load(train_path, "train")?;
        let test = loader.load(test_path, "test")?;
        self.prepare(train, test)
    }

    /// Validate and, unless pre-scaled, min-max scale in-memory tables.
    ///
    /// The scaler is fitted on `train` only and then applied to both tables.
    pub fn prepare(&self, mut train: Table, mut test: Table) -> TbResult<PreparedData> {
        let features = self.config.features.resolve()?;
        let target = self.config.target.clone();
        if features.iter().any(|f| *f == target) {
            return Err(DataError::TargetInFeatures { column: target }.into());
        }

        info!("Name of target column: {}", target);
        info!("No. of exploratory features: {}", features.len());

        for table in [&train, &test] {
            if table.is_empty() {
                return Err(DataError::EmptyTable {
                    table: table.name().to_string(),
                }
                .into());
            }
            features.check_against(table)?;
            table.require_column(&target)?;
        }
        for table in [&train, &test] {
            for column in features.iter().chain(std::iter::once(&target)) {
                check_finite(table, column)?;
            }
            if self.config.problem.is_classification() {
                check_labels(table.require_column(&target)?)?;
            }
        }

        let scaler = if self.config.scaled {
            None
        } else {
            let scaler = MinMaxScaler::fit(&train, &features)?;
            scaler.transform(&mut train)?;
            scaler.transform(&mut test)?;
            Some(scaler)
        };

        info!(
            "Prepared {} train rows and {} test rows (scaled here: {})",
            train.n_rows(),
            test.n_rows(),
            scaler.is_some()
        );

        Ok(PreparedData {
            train,
            test,
            features,
            target,
            problem: self.config.problem,
            scaler,
        })
    }
}

fn check_finite(table: &Table, column: &str) -> TbResult<()> {
    let values = table.require_column(column)?;
    if let Some(row) = values.iter().position(|v| !v.is_finite()) {
        return Err(DataError::NonFinite {
            column: column.to_string(),
            row,
        }
        .into());
    }
    Ok(())
}

fn check_labels(labels: &[f64]) -> TbResult<()> {
    if let Some(&label) = labels.iter().find(|&&l| l.fract() != 0.0) {
        return Err(ModelError::InvalidLabel { label }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_types::TbError;

    fn train() -> Table {
        Table::with_default_index(
            "train",
            vec![
                ("x1".into(), vec![1.0, 2.0, 3.0, 5.0]),
                ("x2".into(), vec![-1.0, 0.0, 1.0, 3.0]),
                ("y".into(), vec![0.0, 1.0, 0.0, 1.0]),
            ],
        )
        .unwrap()
    }

    fn test_table(x1: Vec<f64>) -> Table {
        let n = x1.len();
        Table::with_default_index(
            "test",
            vec![
                ("x1".into(), x1),
                ("x2".into(), vec![0.0; n]),
                ("y".into(), vec![1.0; n]),
            ],
        )
        .unwrap()
    }

    fn config() -> PreparationConfig {
        PreparationConfig::new(
            "y",
            FeatureSource::List(vec!["x1".into(), "x2".into()]),
            ProblemKind::Classification,
        )
    }

    #[test]
    fn scaled_features_lie_in_unit_interval() {
        let prep = DataPreparation::new(config());
        let data = prep.prepare(train(), test_table(vec![0.0, 4.0, 9.0])).unwrap();

        for table in [data.train(), data.test()] {
            for f in data.features().iter() {
                assert!(table
                    .column(f)
                    .unwrap()
                    .iter()
                    .all(|v| (0.0..=1.0).contains(v)));
            }
        }
        // Targets are never scaled.
        assert_eq!(data.train().column("y").unwrap(), &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn scaler_depends_only_on_train() {
        let prep = DataPreparation::new(config());
        let a = prep.prepare(train(), test_table(vec![0.0, 1.0])).unwrap();
        let b = prep.prepare(train(), test_table(vec![100.0, -50.0])).unwrap();
        assert_eq!(a.scaler(), b.scaler());
        assert_eq!(a.train(), b.train());
    }

    #[test]
    fn pre_scaled_inputs_are_untouched() {
        let prep = DataPreparation::new(config().with_scaled(true));
        let data = prep.prepare(train(), test_table(vec![7.0])).unwrap();
        assert!(data.scaler().is_none());
        assert_eq!(data.test().column("x1").unwrap(), &[7.0]);
    }

    #[test]
    fn preserves_row_index() {
        let train = Table::from_columns(
            "train",
            vec!["r9".into(), "r3".into()],
            vec![
                ("x1".into(), vec![1.0, 2.0]),
                ("x2".into(), vec![1.0, 2.0]),
                ("y".into(), vec![0.0, 1.0]),
            ],
        )
        .unwrap();
        let data = DataPreparation::new(config())
            .prepare(train, test_table(vec![1.0]))
            .unwrap();
        assert_eq!(data.train().index(), &["r9", "r3"]);
    }

    #[test]
    fn missing_feature_in_test_is_schema_error() {
        let test = Table::with_default_index(
            "test",
            vec![("x1".into(), vec![1.0]), ("y".into(), vec![0.0])],
        )
        .unwrap();
        let err = DataPreparation::new(config()).prepare(train(), test).unwrap_err();
        match err {
            TbError::Data(DataError::MissingColumn { column, table }) => {
                assert_eq!(column, "x2");
                assert_eq!(table, "test");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_target_is_schema_error() {
        let mut cfg = config();
        cfg.target = "label".into();
        let err = DataPreparation::new(cfg)
            .prepare(train(), test_table(vec![1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            TbError::Data(DataError::MissingColumn { .. })
        ));
    }

    #[test]
    fn fractional_class_labels_are_rejected() {
        let mut bad = train();
        bad.replace_column("y", vec![0.0, 0.5, 1.0, 1.0]).unwrap();
        let err = DataPreparation::new(config())
            .prepare(bad, test_table(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, TbError::Model(ModelError::InvalidLabel { .. })));
    }

    #[test]
    fn target_listed_as_feature_is_rejected() {
        let cfg = PreparationConfig::new(
            "y",
            FeatureSource::List(vec!["x1".into(), "y".into()]),
            ProblemKind::Classification,
        );
        let err = DataPreparation::new(cfg)
            .prepare(train(), test_table(vec![1.0]))
            .unwrap_err();
        match err {
            TbError::Data(DataError::TargetInFeatures { column }) => assert_eq!(column, "y"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn nan_feature_is_rejected() {
        let mut bad = train();
        bad.replace_column("x2", vec![0.0, f64::NAN, 1.0, 1.0]).unwrap();
        let err = DataPreparation::new(config())
            .prepare(bad, test_table(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, TbError::Data(DataError::NonFinite { row: 1, .. })));
    }
}
