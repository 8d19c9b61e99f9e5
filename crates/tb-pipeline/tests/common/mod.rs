#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tb_data::{DataPreparation, FeatureSource, PreparationConfig, PreparedData};
use tb_model::{CrossValScorer, Estimator, Scoring};
use tb_types::{FeatureMatrix, ProblemKind, Table, TbResult};

pub const FEATURES: [&str; 3] = ["x0", "x1", "x2"];

/// Balanced two-class sample separable on `x0`, with two noise columns.
pub fn classification_columns(rows: usize, offset: usize) -> Vec<(String, Vec<f64>)> {
    let label: Vec<f64> = (0..rows).map(|i| ((i + offset) % 2) as f64).collect();
    let x0 = label
        .iter()
        .enumerate()
        .map(|(i, &l)| l * 10.0 + ((i * 7 + offset) % 10) as f64 * 0.5)
        .collect();
    let x1 = (0..rows).map(|i| ((i * 13 + offset) % 17) as f64).collect();
    let x2 = (0..rows).map(|i| ((i * 5 + offset) % 11) as f64 - 5.0).collect();
    vec![
        ("x0".to_string(), x0),
        ("x1".to_string(), x1),
        ("x2".to_string(), x2),
        ("label".to_string(), label),
    ]
}

/// Noisy linear regression target with negative values near zero.
pub fn regression_columns(rows: usize, offset: usize) -> Vec<(String, Vec<f64>)> {
    let x0: Vec<f64> = (0..rows).map(|i| ((i * 3 + offset) % 20) as f64).collect();
    let x1: Vec<f64> = (0..rows).map(|i| ((i * 7 + offset) % 13) as f64).collect();
    let x2: Vec<f64> = (0..rows).map(|i| ((i + offset) % 5) as f64).collect();
    let y = x0
        .iter()
        .zip(&x1)
        .map(|(a, b)| 0.5 * a - 0.2 * b - 1.0)
        .collect();
    vec![
        ("x0".to_string(), x0),
        ("x1".to_string(), x1),
        ("x2".to_string(), x2),
        ("target".to_string(), y),
    ]
}

pub fn feature_source() -> FeatureSource {
    FeatureSource::List(FEATURES.iter().map(|f| f.to_string()).collect())
}

pub fn prepared_classification(rows: usize) -> TbResult<PreparedData> {
    let train = Table::with_default_index("train", classification_columns(rows, 0))?;
    let test = Table::with_default_index("test", classification_columns(rows / 2, 3))?;
    let config = PreparationConfig::new("label", feature_source(), ProblemKind::Classification);
    DataPreparation::new(config).prepare(train, test)
}

pub fn prepared_regression(rows: usize) -> TbResult<PreparedData> {
    let train = Table::with_default_index("train", regression_columns(rows, 0))?;
    let test = Table::with_default_index("test", regression_columns(rows / 2, 1))?;
    let config = PreparationConfig::new("target", feature_source(), ProblemKind::Regression);
    DataPreparation::new(config).prepare(train, test)
}

/// Write `columns` as a CSV file with a header row.
pub fn write_csv(path: &Path, columns: &[(String, Vec<f64>)]) -> std::io::Result<()> {
    let header: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
    let mut out = header.join(",");
    out.push('\n');
    let rows = columns.first().map_or(0, |(_, v)| v.len());
    for row in 0..rows {
        let cells: Vec<String> = columns.iter().map(|(_, v)| v[row].to_string()).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    fs::write(path, out)
}

/// Returns fixed fold scores and records the parameters it was handed.
#[derive(Debug, Default)]
pub struct StubScorer {
    pub scores: Vec<f64>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(f64, usize, usize)>>,
}

impl StubScorer {
    pub fn new(scores: Vec<f64>) -> Self {
        Self {
            scores,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CrossValScorer for StubScorer {
    fn cross_val_score(
        &self,
        estimator: &dyn Estimator,
        _x: &FeatureMatrix,
        _y: &[f64],
        _scoring: Scoring,
    ) -> TbResult<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let params = estimator.params();
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((params.learning_rate, params.n_estimators, params.num_leaves));
        }
        Ok(self.scores.clone())
    }
}

/// Scores peak at learning_rate 0.05 and 400 estimators, so every
/// strategy has a smooth surface to follow.
#[derive(Debug, Default)]
pub struct BowlScorer;

impl CrossValScorer for BowlScorer {
    fn cross_val_score(
        &self,
        estimator: &dyn Estimator,
        _x: &FeatureMatrix,
        _y: &[f64],
        _scoring: Scoring,
    ) -> TbResult<Vec<f64>> {
        let params = estimator.params();
        let lr = (params.learning_rate.ln() - 0.05f64.ln()).powi(2);
        let trees = ((params.n_estimators as f64 - 400.0) / 1000.0).powi(2);
        Ok(vec![0.9 - 0.01 * lr - trees; 5])
    }
}
