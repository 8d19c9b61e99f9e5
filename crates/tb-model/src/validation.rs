//! K-fold cross-validation.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tb_types::{validation_error, FeatureMatrix, ProblemKind, TbResult};
use tracing::{debug, warn};

use crate::estimator::Estimator;
use crate::metrics;

/// Fold score used during the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    RocAuc,
    NegRootMeanSquaredError,
}

impl Scoring {
    pub fn for_problem(problem: ProblemKind) -> Self {
        match problem {
            ProblemKind::Classification => Scoring::RocAuc,
            ProblemKind::Regression => Scoring::NegRootMeanSquaredError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scoring::RocAuc => "roc_auc",
            Scoring::NegRootMeanSquaredError => "neg_root_mean_squared_error",
        }
    }

    /// Both scores are oriented so that larger is better.
    pub fn greater_is_better(&self) -> bool {
        true
    }

    /// Score a fitted estimator on held-out rows.
    pub fn score(&self, estimator: &dyn Estimator, x: &FeatureMatrix, y: &[f64]) -> TbResult<f64> {
        match self {
            Scoring::RocAuc => {
                let proba = estimator.predict_proba(x)?;
                let classes = estimator.classes().unwrap_or_default();
                // Held-out labels as probability column ids; unseen labels
                // get an id past the last column.
                let ids: Vec<f64> = y
                    .iter()
                    .map(|label| {
                        classes
                            .iter()
                            .position(|c| c == label)
                            .unwrap_or(classes.len()) as f64
                    })
                    .collect();
                if classes.len() == 2 {
                    let positive: Vec<f64> = proba.iter().map(|p| p[1]).collect();
                    metrics::roc_auc(&ids, &positive)
                } else {
                    metrics::roc_auc_ovr(&ids, &proba)
                }
            }
            Scoring::NegRootMeanSquaredError => {
                let pred = estimator.predict(x)?;
                Ok(-metrics::rmse(y, &pred)?)
            }
        }
    }
}

/// Train/test row indices of one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous, unshuffled folds; the first `n % k` folds get one extra row.
pub fn kfold(n_rows: usize, n_splits: usize) -> TbResult<Vec<Fold>> {
    check_splits(n_rows, n_splits)?;
    let mut test_sets = vec![Vec::new(); n_splits];
    for (fold, range) in chunk_ranges(n_rows, n_splits).into_iter().enumerate() {
        test_sets[fold].extend(range);
    }
    Ok(complete_folds(n_rows, test_sets))
}

/// Unshuffled folds preserving class proportions.
///
/// Each class's rows, in order, are cut into `k` contiguous chunks and chunk
/// `j` goes to fold `j`.
pub fn stratified_kfold(y: &[f64], n_splits: usize) -> TbResult<Vec<Fold>> {
    check_splits(y.len(), n_splits)?;
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label as i64).or_default().push(i);
    }
    let largest = by_class.values().map(Vec::len).max().unwrap_or(0);
    if largest < n_splits {
        return Err(validation_error!(
            "n_splits={} cannot be greater than the number of members in each class",
            n_splits
        ));
    }
    if let Some((class, rows)) = by_class.iter().find(|(_, rows)| rows.len() < n_splits) {
        warn!(
            "The least populated class {} has only {} members, fewer than n_splits={}",
            class,
            rows.len(),
            n_splits
        );
    }

    let mut test_sets = vec![Vec::new(); n_splits];
    for rows in by_class.values() {
        for (fold, range) in chunk_ranges(rows.len(), n_splits).into_iter().enumerate() {
            test_sets[fold].extend(range.map(|i| rows[i]));
        }
    }
    for set in &mut test_sets {
        set.sort_unstable();
    }
    Ok(complete_folds(y.len(), test_sets))
}

fn check_splits(n_rows: usize, n_splits: usize) -> TbResult<()> {
    if n_splits < 2 {
        return Err(validation_error!("n_splits must be at least 2, got {}", n_splits));
    }
    if n_rows < n_splits {
        return Err(validation_error!(
            "Cannot have n_splits={} greater than the number of samples {}",
            n_splits,
            n_rows
        ));
    }
    Ok(())
}

fn chunk_ranges(n: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let (base, extra) = (n / k, n % k);
    let mut start = 0;
    (0..k)
        .map(|fold| {
            let len = base + usize::from(fold < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

fn complete_folds(n_rows: usize, test_sets: Vec<Vec<usize>>) -> Vec<Fold> {
    test_sets
        .into_iter()
        .map(|test| {
            let mut in_test = vec![false; n_rows];
            for &i in &test {
                in_test[i] = true;
            }
            let train = (0..n_rows).filter(|&i| !in_test[i]).collect();
            Fold { train, test }
        })
        .collect()
}

/// Produces one score per fold for an unfitted estimator.
pub trait CrossValScorer: Send + Sync {
    fn cross_val_score(
        &self,
        estimator: &dyn Estimator,
        x: &FeatureMatrix,
        y: &[f64],
        scoring: Scoring,
    ) -> TbResult<Vec<f64>>;
}

/// K-fold scorer; classification folds are stratified.
///
/// Every fold fits its own clone of the estimator, so folds may run in
/// parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KFoldScorer {
    pub n_splits: usize,
    pub parallel: bool,
}

impl Default for KFoldScorer {
    fn default() -> Self {
        Self {
            n_splits: 5,
            parallel: true,
        }
    }
}

impl KFoldScorer {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Self::default()
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn score_fold(
        estimator: &dyn Estimator,
        x: &FeatureMatrix,
        y: &[f64],
        fold: &Fold,
        scoring: Scoring,
    ) -> TbResult<f64> {
        let mut model = estimator.clone_box();
        let y_train: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
        let y_test: Vec<f64> = fold.test.iter().map(|&i| y[i]).collect();
        model.fit(&x.select_rows(&fold.train), &y_train)?;
        scoring.score(model.as_ref(), &x.select_rows(&fold.test), &y_test)
    }
}

impl CrossValScorer for KFoldScorer {
    fn cross_val_score(
        &self,
        estimator: &dyn Estimator,
        x: &FeatureMatrix,
        y: &[f64],
        scoring: Scoring,
    ) -> TbResult<Vec<f64>> {
        if x.n_rows() != y.len() {
            return Err(validation_error!(
                "{} targets for {} feature rows",
                y.len(),
                x.n_rows()
            ));
        }
        let folds = if estimator.problem().is_classification() {
            stratified_kfold(y, self.n_splits)?
        } else {
            kfold(y.len(), self.n_splits)?
        };

        let scores: TbResult<Vec<f64>> = if self.parallel {
            folds
                .par_iter()
                .map(|fold| Self::score_fold(estimator, x, y, fold, scoring))
                .collect()
        } else {
            folds
                .iter()
                .map(|fold| Self::score_fold(estimator, x, y, fold, scoring))
                .collect()
        };
        let scores = scores?;
        debug!("{} fold scores ({}): {:?}", scoring.name(), scores.len(), scores);
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::LeafWiseBooster;
    use tb_types::ParameterValue;

    #[test]
    fn kfold_matches_contiguous_layout() {
        let folds = kfold(7, 3).unwrap();
        assert_eq!(folds[0].test, vec![0, 1, 2]);
        assert_eq!(folds[1].test, vec![3, 4]);
        assert_eq!(folds[2].test, vec![5, 6]);
        assert_eq!(folds[1].train, vec![0, 1, 2, 5, 6]);
    }

    #[test]
    fn stratified_folds_balance_classes() {
        let y: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 1.0 }).collect();
        let folds = stratified_kfold(&y, 5).unwrap();
        let mut seen = vec![0; 20];
        for fold in &folds {
            let pos = fold.test.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(pos, 2);
            assert_eq!(fold.test.len(), 4);
            for &i in &fold.test {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn rejects_too_many_splits() {
        assert!(kfold(3, 5).is_err());
        assert!(stratified_kfold(&[0.0, 1.0, 0.0, 1.0, 1.0, 0.0], 5).is_err());
        assert!(kfold(10, 1).is_err());
    }

    #[test]
    fn cross_val_scores_separable_data_highly() {
        let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64 / 100.0, ((i * 7) % 10) as f64]).collect();
        let y: Vec<f64> = (0..100).map(|i| if i < 50 { 0.0 } else { 1.0 }).collect();
        let x = FeatureMatrix::from_rows(rows).unwrap();
        let mut est = LeafWiseBooster::new(ProblemKind::Classification);
        est.set_param("n_estimators", &ParameterValue::Int(10)).unwrap();

        let scorer = KFoldScorer::new(5);
        let scores = scorer.cross_val_score(&est, &x, &y, Scoring::RocAuc).unwrap();
        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        // The caller's estimator stays unfitted.
        assert!(!est.is_fitted());

        let serial = scorer
            .with_parallel(false)
            .cross_val_score(&est, &x, &y, Scoring::RocAuc)
            .unwrap();
        assert!(scores.iter().zip(&serial).all(|(a, b)| (a - b).abs() < 1e-9));
    }

    #[test]
    fn roc_auc_follows_fitted_labels() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 2) as f64, i as f64 / 60.0]).collect();
        let y: Vec<f64> = (0..60).map(|i| if i % 2 == 0 { 1.0 } else { 2.0 }).collect();
        let x = FeatureMatrix::from_rows(rows).unwrap();
        let mut est = LeafWiseBooster::new(ProblemKind::Classification);
        est.set_param("n_estimators", &ParameterValue::Int(10)).unwrap();
        est.fit(&x, &y).unwrap();
        let auc = Scoring::RocAuc.score(&est, &x, &y).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn class_rarer_than_folds_leaves_a_fold_unscorable() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 40.0]).collect();
        let mut y = vec![0.0; 40];
        y[10] = 1.0;
        y[30] = 1.0;
        let x = FeatureMatrix::from_rows(rows).unwrap();
        let mut est = LeafWiseBooster::new(ProblemKind::Classification);
        est.set_param("n_estimators", &ParameterValue::Int(5)).unwrap();
        let err = KFoldScorer::new(5)
            .with_parallel(false)
            .cross_val_score(&est, &x, &y, Scoring::RocAuc)
            .unwrap_err();
        assert!(matches!(
            err,
            tb_types::TbError::Model(tb_types::ModelError::UndefinedScore { .. })
        ));
    }

    #[test]
    fn regression_score_is_negative_rmse() {
        let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..50).map(|i| (i % 5) as f64).collect();
        let x = FeatureMatrix::from_rows(rows).unwrap();
        let mut est = LeafWiseBooster::new(ProblemKind::Regression);
        est.set_param("n_estimators", &ParameterValue::Int(5)).unwrap();
        let scores = KFoldScorer::default()
            .cross_val_score(&est, &x, &y, Scoring::NegRootMeanSquaredError)
            .unwrap();
        assert!(scores.iter().all(|s| *s <= 0.0));
    }
}
