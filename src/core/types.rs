//! Core type definitions for nested cross-validation

use crate::core::{CVError, Result};
use crate::metrics::ClassificationMetrics;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Binary class label (0 or 1)
pub type Label = u8;

/// Check that every label is 0 or 1
pub fn validate_labels(labels: &[Label]) -> Result<()> {
    match labels.iter().find(|&&l| l > 1) {
        Some(&bad) => Err(CVError::InvalidLabel(bad as f64)),
        None => Ok(()),
    }
}

/// One train/test partition of sample indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSplit {
    /// 0-based positions of the training samples
    pub train: Vec<usize>,
    /// 0-based positions of the held-out samples
    pub test: Vec<usize>,
}

impl FoldSplit {
    pub fn new(train: Vec<usize>, test: Vec<usize>) -> Self {
        Self { train, test }
    }

    /// Check that the split is usable against a sample set of size `n`:
    /// both sides non-empty, indices in range, no duplicates, no overlap.
    pub fn validate(&self, n: usize) -> Result<()> {
        if self.train.is_empty() || self.test.is_empty() {
            return Err(CVError::Data(format!(
                "split has {} training and {} test samples, both must be non-empty",
                self.train.len(),
                self.test.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.train.len() + self.test.len());
        for &index in self.train.iter().chain(self.test.iter()) {
            if index >= n {
                return Err(CVError::IndexOutOfRange { index, len: n });
            }
            if !seen.insert(index) {
                return Err(CVError::Data(format!(
                    "sample {index} appears more than once in a split"
                )));
            }
        }

        Ok(())
    }
}

/// Validate a whole partition list against `n` samples and the expected count
pub fn validate_splits(splits: &[FoldSplit], n: usize, expected: usize) -> Result<()> {
    if splits.len() != expected {
        return Err(CVError::Configuration(format!(
            "expected {expected} outer splits, {} were supplied",
            splits.len()
        )));
    }
    for (i, split) in splits.iter().enumerate() {
        split
            .validate(n)
            .map_err(|e| CVError::Data(format!("outer split {i}: {e}")))?;
    }
    Ok(())
}

/// Ordered, immutable grid of candidate regularization strengths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CGrid {
    values: Vec<f64>,
}

impl CGrid {
    /// Build a grid from explicit values; all must be finite and positive
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(CVError::Configuration(
                "the C grid must contain at least one candidate".to_string(),
            ));
        }
        if let Some(bad) = values.iter().find(|c| !c.is_finite() || **c <= 0.0) {
            return Err(CVError::Configuration(format!(
                "C candidates must be finite and positive, got {bad}"
            )));
        }
        Ok(Self { values })
    }

    /// `num` values evenly spaced in log10 space from 10^start to 10^stop
    pub fn logspace(start: f64, stop: f64, num: usize) -> Result<Self> {
        let values = match num {
            0 => Vec::new(),
            1 => vec![10f64.powf(start)],
            _ => {
                let step = (stop - start) / (num - 1) as f64;
                (0..num)
                    .map(|i| 10f64.powf(start + step * i as f64))
                    .collect()
            }
        };
        Self::new(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for CGrid {
    /// 17 values from 1e-6 to 1e2
    fn default() -> Self {
        let step = 0.5;
        Self {
            values: (0..17)
                .map(|i| 10f64.powf(-6.0 + step * i as f64))
                .collect(),
        }
    }
}

/// Class weighting applied to the per-sample upper bound C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    /// Every sample is bounded by C
    Uniform,
    /// Class k is bounded by C * n / (2 * n_k)
    Balanced,
}

impl Default for ClassWeight {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Configuration for a single SVM fit
#[derive(Debug, Clone)]
pub struct SvmConfig {
    /// Regularization parameter (upper bound for alpha)
    pub c: f64,
    /// Stopping tolerance on the maximal KKT violation
    pub tolerance: f64,
    /// Maximum number of pair updates before the solver gives up
    pub max_iterations: usize,
    /// Per-class scaling of C
    pub class_weight: ClassWeight,
    /// Fit a Platt sigmoid so that probabilities are available
    pub probability: bool,
    /// Internal folds used to produce decision values for the sigmoid fit
    pub probability_folds: usize,
    /// Seed for the internal probability cross-validation
    pub seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tolerance: 1e-6,
            max_iterations: 1_000_000,
            class_weight: ClassWeight::Balanced,
            probability: true,
            probability_folds: 5,
            seed: 0,
        }
    }
}

/// Selected hyperparameter together with the inner-CV score that backs it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestParameters {
    pub c: f64,
    pub balanced_accuracy: f64,
}

/// Everything produced by one outer fold (or holdout iteration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterFoldResult {
    /// Position of the split in the outer partition
    pub fold: usize,
    pub best_parameter: BestParameters,
    /// Metrics on the held-out samples
    pub evaluation: ClassificationMetrics,
    /// Metrics on the outer-training samples (diagnostic only)
    pub evaluation_train: ClassificationMetrics,
    pub y_hat: Vec<Label>,
    pub y_hat_train: Vec<Label>,
    pub y: Vec<Label>,
    pub y_train: Vec<Label>,
    /// Test AUC from positive-class probabilities, NaN when undefined
    pub auc: f64,
    pub train_index: Vec<usize>,
    pub test_index: Vec<usize>,
}
