//! Predictions of a trained model over one table, for downstream reporting.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tb_model::metrics;
use tb_types::{ModelError, ProblemKind, TbResult};
use tracing::info;

/// Row-aligned observed and predicted targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    /// Name of the table the rows came from.
    pub table: String,
    pub target: String,
    pub problem: ProblemKind,
    pub index: Vec<String>,
    pub observed: Vec<f64>,
    pub predicted: Vec<f64>,
    /// Regression predictions with negative values clamped to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted: Option<Vec<f64>>,
    /// Per-row class probabilities for classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<Vec<f64>>>,
}

impl PredictionSet {
    pub fn len(&self) -> usize {
        self.predicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicted.is_empty()
    }

    /// Share of rows whose predicted class matches the observed one.
    pub fn accuracy(&self) -> TbResult<f64> {
        if !self.problem.is_classification() {
            return Err(ModelError::Unsupported {
                operation: "accuracy".to_string(),
                problem: self.problem.to_string(),
            }
            .into());
        }
        metrics::accuracy(&self.observed, &self.predicted)
    }

    pub fn write_json(&self, path: &Path) -> TbResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!("Saved {} predictions to {}", self.len(), path.display());
        Ok(())
    }
}

/// Clamp negative regression predictions to zero.
pub fn clamp_negative(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| if v < 0.0 { 0.0 } else { v }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regression_set() -> PredictionSet {
        let predicted = vec![-0.5, 1.5, 0.0];
        PredictionSet {
            table: "test".into(),
            target: "y".into(),
            problem: ProblemKind::Regression,
            index: vec!["a".into(), "b".into(), "c".into()],
            observed: vec![0.0, 2.0, 0.1],
            adjusted: Some(clamp_negative(&predicted)),
            predicted,
            probabilities: None,
        }
    }

    #[test]
    fn clamps_only_negative_values() {
        assert_eq!(clamp_negative(&[-1.0, 0.0, 2.5]), vec![0.0, 0.0, 2.5]);
    }

    #[test]
    fn accuracy_is_classification_only() {
        assert!(regression_set().accuracy().is_err());

        let set = PredictionSet {
            problem: ProblemKind::Classification,
            observed: vec![0.0, 1.0, 1.0, 0.0],
            predicted: vec![0.0, 1.0, 0.0, 0.0],
            adjusted: None,
            index: vec!["0".into(), "1".into(), "2".into(), "3".into()],
            ..regression_set()
        };
        assert!((set.accuracy().unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn writes_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("predictions_y.json");
        let set = regression_set();
        set.write_json(&path).unwrap();

        let reloaded: PredictionSet =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded, set);
    }
}
