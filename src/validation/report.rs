//! Tab-separated result tables

use crate::core::{Label, OuterFoldResult, Result};
use crate::metrics::{nan_mean, ClassificationMetrics};
use crate::validation::HoldoutVariance;
use csv::WriterBuilder;
use log::info;
use serde::Serialize;
use std::path::Path;

/// Write `rows` as a TSV file with a header line
pub fn write_tsv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_ref())?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One held-out subject of a k-fold split
#[derive(Debug, Clone, Serialize)]
pub struct SubjectRow {
    pub y: Label,
    pub y_hat: Label,
    pub y_index: usize,
}

impl SubjectRow {
    pub fn from_result(result: &OuterFoldResult) -> Vec<Self> {
        result
            .y
            .iter()
            .zip(&result.y_hat)
            .zip(&result.test_index)
            .map(|((&y, &y_hat), &y_index)| Self { y, y_hat, y_index })
            .collect()
    }
}

/// One subject of a holdout iteration (train or test side)
#[derive(Debug, Clone, Serialize)]
pub struct IterationSubjectRow {
    pub iteration: usize,
    pub y: Label,
    pub y_hat: Label,
    pub subject_index: usize,
}

impl IterationSubjectRow {
    fn rows(iteration: usize, y: &[Label], y_hat: &[Label], index: &[usize]) -> Vec<Self> {
        y.iter()
            .zip(y_hat)
            .zip(index)
            .map(|((&y, &y_hat), &subject_index)| Self {
                iteration,
                y,
                y_hat,
                subject_index,
            })
            .collect()
    }

    pub fn test_rows(result: &OuterFoldResult) -> Vec<Self> {
        Self::rows(result.fold, &result.y, &result.y_hat, &result.test_index)
    }

    pub fn train_rows(result: &OuterFoldResult) -> Vec<Self> {
        Self::rows(
            result.fold,
            &result.y_train,
            &result.y_hat_train,
            &result.train_index,
        )
    }
}

/// Held-out metrics of one split
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldMetricsRow {
    pub balanced_accuracy: f64,
    pub auc: f64,
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub ppv: f64,
    pub npv: f64,
}

impl FoldMetricsRow {
    pub fn new(evaluation: &ClassificationMetrics, auc: f64) -> Self {
        Self {
            balanced_accuracy: evaluation.balanced_accuracy,
            auc,
            accuracy: evaluation.accuracy,
            sensitivity: evaluation.sensitivity,
            specificity: evaluation.specificity,
            ppv: evaluation.ppv,
            npv: evaluation.npv,
        }
    }

    pub fn from_result(result: &OuterFoldResult) -> Self {
        Self::new(&result.evaluation, result.auc)
    }

    /// Column-wise mean ignoring NaN
    pub fn mean(rows: &[Self]) -> Self {
        Self {
            balanced_accuracy: nan_mean(rows.iter().map(|r| r.balanced_accuracy)),
            auc: nan_mean(rows.iter().map(|r| r.auc)),
            accuracy: nan_mean(rows.iter().map(|r| r.accuracy)),
            sensitivity: nan_mean(rows.iter().map(|r| r.sensitivity)),
            specificity: nan_mean(rows.iter().map(|r| r.specificity)),
            ppv: nan_mean(rows.iter().map(|r| r.ppv)),
            npv: nan_mean(rows.iter().map(|r| r.npv)),
        }
    }

    pub fn log_summary(&self) {
        info!("Mean results of the classification:");
        info!("Balanced accuracy: {}", self.balanced_accuracy);
        info!("specificity: {}", self.specificity);
        info!("sensitivity: {}", self.sensitivity);
        info!("auc: {}", self.auc);
    }
}

/// Held-out and training metrics of one holdout iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationMetricsRow {
    pub balanced_accuracy: f64,
    pub auc: f64,
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub ppv: f64,
    pub npv: f64,
    pub train_balanced_accuracy: f64,
    pub train_accuracy: f64,
    pub train_sensitivity: f64,
    pub train_specificity: f64,
    pub train_ppv: f64,
    pub train_npv: f64,
}

impl IterationMetricsRow {
    pub fn from_result(result: &OuterFoldResult) -> Self {
        let test = &result.evaluation;
        let train = &result.evaluation_train;
        Self {
            balanced_accuracy: test.balanced_accuracy,
            auc: result.auc,
            accuracy: test.accuracy,
            sensitivity: test.sensitivity,
            specificity: test.specificity,
            ppv: test.ppv,
            npv: test.npv,
            train_balanced_accuracy: train.balanced_accuracy,
            train_accuracy: train.accuracy,
            train_sensitivity: train.sensitivity,
            train_specificity: train.specificity,
            train_ppv: train.ppv,
            train_npv: train.npv,
        }
    }

    /// Held-out part of the row
    pub fn test_metrics(&self) -> FoldMetricsRow {
        FoldMetricsRow {
            balanced_accuracy: self.balanced_accuracy,
            auc: self.auc,
            accuracy: self.accuracy,
            sensitivity: self.sensitivity,
            specificity: self.specificity,
            ppv: self.ppv,
            npv: self.npv,
        }
    }

    /// Column-wise mean ignoring NaN
    pub fn mean(rows: &[Self]) -> Self {
        let col = |f: fn(&Self) -> f64| nan_mean(rows.iter().map(f));
        Self {
            balanced_accuracy: col(|r| r.balanced_accuracy),
            auc: col(|r| r.auc),
            accuracy: col(|r| r.accuracy),
            sensitivity: col(|r| r.sensitivity),
            specificity: col(|r| r.specificity),
            ppv: col(|r| r.ppv),
            npv: col(|r| r.npv),
            train_balanced_accuracy: col(|r| r.train_balanced_accuracy),
            train_accuracy: col(|r| r.train_accuracy),
            train_sensitivity: col(|r| r.train_sensitivity),
            train_specificity: col(|r| r.train_specificity),
            train_ppv: col(|r| r.train_ppv),
            train_npv: col(|r| r.train_npv),
        }
    }
}

/// Single-row variance table
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VarianceRow {
    pub bal_accuracy_resampled_t: f64,
    pub bal_accuracy_corrected_resampled_t: f64,
    pub error_resampled_t: f64,
    pub error_corrected_resampled_t: f64,
}

impl From<&HoldoutVariance> for VarianceRow {
    fn from(variance: &HoldoutVariance) -> Self {
        Self {
            bal_accuracy_resampled_t: variance.balanced_accuracy.resampled_t,
            bal_accuracy_corrected_resampled_t: variance.balanced_accuracy.corrected_resampled_t,
            error_resampled_t: variance.error.resampled_t,
            error_corrected_resampled_t: variance.error.corrected_resampled_t,
        }
    }
}
