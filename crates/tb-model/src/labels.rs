//! Class label encoding and resolution of the training task.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tb_types::{ModelError, ObjectiveLabel, ProblemKind, TbResult};

/// Maps the distinct class labels seen at fit time onto `0..k`.
///
/// Native boosters expect contiguous class ids; predictions are mapped back
/// to the original labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<f64>,
}

impl LabelEncoder {
    /// Collect the sorted distinct labels of `y`.
    pub fn fit(y: &[f64]) -> TbResult<Self> {
        if let Some(&label) = y.iter().find(|l| !l.is_finite() || l.fract() != 0.0) {
            return Err(ModelError::InvalidLabel { label }.into());
        }
        let mut classes = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        Ok(Self { classes })
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Original labels in encoded order.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn encode_one(&self, label: f64) -> TbResult<usize> {
        self.classes
            .binary_search_by(|c| c.partial_cmp(&label).unwrap_or(Ordering::Less))
            .map_err(|_| ModelError::InvalidLabel { label }.into())
    }

    /// Encoded ids of `y`, as the `f64` labels native libraries take.
    pub fn encode(&self, y: &[f64]) -> TbResult<Vec<f64>> {
        y.iter()
            .map(|&label| self.encode_one(label).map(|id| id as f64))
            .collect()
    }

    pub fn decode(&self, id: usize) -> Option<f64> {
        self.classes.get(id).copied()
    }
}

/// What a native booster is asked to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    Regression,
    Binary,
    Multiclass { n_classes: usize },
}

impl Task {
    /// Resolve the task from the problem kind, the configured objective and,
    /// for classification, the number of distinct classes.
    pub fn resolve(
        problem: ProblemKind,
        objective: Option<ObjectiveLabel>,
        n_classes: usize,
    ) -> TbResult<Self> {
        if problem == ProblemKind::Regression {
            return Ok(Task::Regression);
        }
        if n_classes < 2 {
            return Err(ModelError::TrainingFailed {
                message: format!("classification needs at least two classes, found {n_classes}"),
            }
            .into());
        }
        match objective {
            Some(ObjectiveLabel::Binary) if n_classes > 2 => Err(ModelError::InvalidParameter {
                name: "objective".to_string(),
                message: format!("binary objective but labels span {n_classes} classes"),
            }
            .into()),
            Some(ObjectiveLabel::Binary) => Ok(Task::Binary),
            Some(ObjectiveLabel::Multiclass) => Ok(Task::Multiclass { n_classes }),
            None if n_classes == 2 => Ok(Task::Binary),
            None => Ok(Task::Multiclass { n_classes }),
        }
    }

    /// Native outputs per row.
    pub fn outputs_per_row(&self) -> usize {
        match self {
            Task::Regression | Task::Binary => 1,
            Task::Multiclass { n_classes } => *n_classes,
        }
    }
}
