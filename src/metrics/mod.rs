//! Classification metrics for binary label/prediction pairs

use crate::core::Label;
use serde::{Deserialize, Serialize};

/// Confusion-matrix derived metrics
///
/// Ratios with a zero denominator are reported as 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub balanced_accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub ppv: f64,
    pub npv: f64,
}

impl ClassificationMetrics {
    /// Score predictions against true labels (1 is the positive class)
    pub fn evaluate(y: &[Label], y_hat: &[Label]) -> Self {
        debug_assert_eq!(y.len(), y_hat.len());

        let mut tp = 0usize; // True positives
        let mut tn = 0usize; // True negatives
        let mut fp = 0usize; // False positives
        let mut fn_ = 0usize; // False negatives

        for (&actual, &predicted) in y.iter().zip(y_hat) {
            match (predicted == 1, actual == 1) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };

        let sensitivity = ratio(tp, tp + fn_);
        let specificity = ratio(tn, tn + fp);

        Self {
            accuracy: ratio(tp + tn, tp + tn + fp + fn_),
            balanced_accuracy: (sensitivity + specificity) / 2.0,
            sensitivity,
            specificity,
            ppv: ratio(tp, tp + fp),
            npv: ratio(tn, tn + fn_),
        }
    }
}

/// Fraction of mismatched predictions
pub fn error_rate(y: &[Label], y_hat: &[Label]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let wrong = y.iter().zip(y_hat).filter(|(a, b)| a != b).count();
    wrong as f64 / y.len() as f64
}

/// Area under the ROC curve for positive-class `scores`.
///
/// Uses the rank-sum form with average ranks for ties, which equals the
/// trapezoidal ROC area. Returns `None` when `y` holds a single class.
pub fn roc_auc(y: &[Label], scores: &[f64]) -> Option<f64> {
    debug_assert_eq!(y.len(), scores.len());

    let n_pos = y.iter().filter(|&&l| l == 1).count();
    let n_neg = y.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average ranks (1-based) over runs of tied scores
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg_rank;
        }
        start = end;
    }

    let pos_rank_sum: f64 = y
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l == 1)
        .map(|(_, &r)| r)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Arithmetic mean ignoring NaN values; NaN when nothing is left
pub fn nan_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
