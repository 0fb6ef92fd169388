//! Resampled-t variance estimates for repeated holdout (Nadeau & Bengio, 2003)

use crate::core::{CVError, OuterFoldResult, Result};
use crate::metrics::error_rate;
use serde::{Deserialize, Serialize};

/// Naive and corrected variance of a per-iteration statistic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceEstimate {
    /// s^2 / J
    pub resampled_t: f64,
    /// s^2 * (1/J + n_test/n_train)
    pub corrected_resampled_t: f64,
}

/// Estimates for the two statistics reported after repeated holdout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutVariance {
    pub balanced_accuracy: VarianceEstimate,
    pub error: VarianceEstimate,
}

/// Variance of `values` (one per iteration) with the Nadeau-Bengio correction
///
/// `test_fraction` is the held-out share of each split; the correction term
/// is `test_fraction / (1 - test_fraction)`.
pub fn resampled_t_variance(values: &[f64], test_fraction: f64) -> Result<VarianceEstimate> {
    let j = values.len();
    if j < 2 {
        return Err(CVError::Configuration(format!(
            "variance estimation needs at least 2 iterations, got {j}"
        )));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CVError::Configuration(format!(
            "test fraction must lie strictly between 0 and 1, got {test_fraction}"
        )));
    }

    let j = j as f64;
    let mean = values.iter().sum::<f64>() / j;
    let s2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (j - 1.0);

    Ok(VarianceEstimate {
        resampled_t: s2 / j,
        corrected_resampled_t: s2 * (1.0 / j + test_fraction / (1.0 - test_fraction)),
    })
}

/// Error-rate and balanced-accuracy variance over holdout iterations
pub fn holdout_variance(results: &[OuterFoldResult], test_fraction: f64) -> Result<HoldoutVariance> {
    let errors: Vec<f64> = results.iter().map(|r| error_rate(&r.y, &r.y_hat)).collect();
    let accuracies: Vec<f64> = results
        .iter()
        .map(|r| r.evaluation.balanced_accuracy)
        .collect();

    Ok(HoldoutVariance {
        balanced_accuracy: resampled_t_variance(&accuracies, test_fraction)?,
        error: resampled_t_variance(&errors, test_fraction)?,
    })
}
