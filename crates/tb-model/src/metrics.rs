//! Scores used to evaluate folds.

use tb_types::{ModelError, TbResult};

/// Area under the ROC curve for binary labels (0/1) and positive-class scores.
///
/// Tied scores receive their average rank.
pub fn roc_auc(y_true: &[f64], scores: &[f64]) -> TbResult<f64> {
    check_lengths(y_true.len(), scores.len())?;
    let n_pos = y_true.iter().filter(|&&y| y == 1.0).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ModelError::UndefinedScore {
            message: "ROC AUC needs both positive and negative samples".to_string(),
        }
        .into());
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; ties share the mean of ranks i+1..=j+1.
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] == 1.0 {
                pos_rank_sum += rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// One-vs-rest ROC AUC averaged over classes present in `y_true`.
pub fn roc_auc_ovr(y_true: &[f64], proba: &[Vec<f64>]) -> TbResult<f64> {
    check_lengths(y_true.len(), proba.len())?;
    let n_classes = proba.first().map(Vec::len).unwrap_or(0);
    let mut total = 0.0;
    let mut counted = 0usize;
    for class in 0..n_classes {
        let labels: Vec<f64> = y_true
            .iter()
            .map(|&y| if y as usize == class { 1.0 } else { 0.0 })
            .collect();
        let positives = labels.iter().filter(|&&l| l == 1.0).count();
        if positives == 0 || positives == labels.len() {
            continue;
        }
        let scores: Vec<f64> = proba.iter().map(|p| p[class]).collect();
        total += roc_auc(&labels, &scores)?;
        counted += 1;
    }
    if counted == 0 {
        return Err(ModelError::UndefinedScore {
            message: "no class has both positive and negative samples".to_string(),
        }
        .into());
    }
    Ok(total / counted as f64)
}

pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> TbResult<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    non_empty(y_true.len())?;
    let mse = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64;
    Ok(mse.sqrt())
}

pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> TbResult<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    non_empty(y_true.len())?;
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / y_true.len() as f64)
}

fn check_lengths(expected: usize, actual: usize) -> TbResult<()> {
    if expected != actual {
        return Err(ModelError::UndefinedScore {
            message: format!("{actual} predictions for {expected} targets"),
        }
        .into());
    }
    Ok(())
}

fn non_empty(n: usize) -> TbResult<()> {
    if n == 0 {
        return Err(ModelError::UndefinedScore {
            message: "no samples".to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_and_inverted_rankings() {
        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn ties_count_half() {
        let y = [0.0, 1.0];
        assert_eq!(roc_auc(&y, &[0.5, 0.5]).unwrap(), 0.5);
        // One discordant pair out of four.
        let y = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75);
    }

    #[test]
    fn single_class_is_undefined() {
        assert!(roc_auc(&[1.0, 1.0], &[0.2, 0.3]).is_err());
    }

    #[test]
    fn ovr_averages_classes() {
        let y = [0.0, 1.0, 2.0];
        let proba = vec![
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.1, 0.1, 0.8],
        ];
        assert_eq!(roc_auc_ovr(&y, &proba).unwrap(), 1.0);
    }

    #[test]
    fn rmse_and_accuracy() {
        assert_eq!(rmse(&[1.0, 3.0], &[1.0, 1.0]).unwrap(), 2.0f64.sqrt());
        assert_eq!(accuracy(&[0.0, 1.0, 1.0, 0.0], &[0.0, 1.0, 0.0, 0.0]).unwrap(), 0.75);
        assert!(rmse(&[], &[]).is_err());
    }
}
