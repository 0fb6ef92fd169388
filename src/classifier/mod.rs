//! Linear SVM classifier over precomputed kernel slices
//!
//! `SvmClassifier` turns a training kernel and 0/1 labels into a
//! `TrainedSvm`: class-weighted box constraints are built, the dual is
//! solved with SMO, and (optionally) a Platt sigmoid is fitted on
//! internally cross-validated decision values. Prediction takes the kernel
//! between new samples (rows) and the training samples (columns).

use crate::core::{
    validate_labels, CVError, ClassWeight, Label, Matrix, Result, SvmConfig,
};
use crate::metrics::roc_auc;
use crate::solver::{OptimizationResult, PlattScaling, SMOSolver};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Trainer for binary C-SVC models
#[derive(Debug, Clone, Default)]
pub struct SvmClassifier {
    config: SvmConfig,
}

impl SvmClassifier {
    pub fn new(config: SvmConfig) -> Self {
        Self { config }
    }

    /// Set the regularization strength C
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.config.class_weight = class_weight;
        self
    }

    /// Enable or disable the Platt probability fit
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.config.probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn config(&self) -> &SvmConfig {
        &self.config
    }

    /// Fit on an n x n training kernel and n labels
    pub fn fit(&self, kernel: &Matrix, labels: &[Label]) -> Result<TrainedSvm> {
        let n = labels.len();
        if n == 0 {
            return Err(CVError::EmptyDataset);
        }
        if kernel.rows() != n || kernel.cols() != n {
            return Err(CVError::DimensionMismatch {
                expected: n,
                actual: kernel.rows(),
            });
        }
        validate_labels(labels)?;
        if !(self.config.c.is_finite() && self.config.c > 0.0) {
            return Err(CVError::Configuration(format!(
                "C must be finite and positive, got {}",
                self.config.c
            )));
        }

        let n_positive = labels.iter().filter(|&&l| l == 1).count();
        if n_positive == 0 || n_positive == n {
            return Err(CVError::training(format!(
                "training data contains a single class ({n} samples of class {})",
                labels[0]
            )));
        }

        let y = signed_labels(labels);
        let upper = self.box_constraints(labels, n_positive);

        let solver = SMOSolver::from_config(&self.config);
        let result = solver.solve(kernel, &y, &upper)?;
        debug!(
            "Fitted C={} on {n} samples: {} support vectors, {} iterations",
            self.config.c,
            result.support_vectors.len(),
            result.iterations
        );

        let probability = if self.config.probability {
            let decisions = self.cross_validated_decisions(kernel, &y, &upper)?;
            Some(PlattScaling::fit(&decisions, &y))
        } else {
            None
        };

        Ok(TrainedSvm::from_solution(
            &result,
            &y,
            n,
            self.config.c,
            probability,
        ))
    }

    /// Fit with C on the training slice, then predict the test slice
    ///
    /// `test_kernel` is K[test, train]. Test AUC comes from positive-class
    /// probabilities and is NaN when `y_test` holds a single class.
    pub fn train_and_score(
        &self,
        train_kernel: &Matrix,
        test_kernel: &Matrix,
        y_train: &[Label],
        y_test: &[Label],
        c: f64,
    ) -> Result<ScoredFit> {
        if test_kernel.rows() != y_test.len() {
            return Err(CVError::DimensionMismatch {
                expected: y_test.len(),
                actual: test_kernel.rows(),
            });
        }

        let model = self.clone().with_c(c).fit(train_kernel, y_train)?;
        let y_hat = model.predict(test_kernel)?;
        let y_hat_train = model.predict(train_kernel)?;

        let auc = if model.has_probability() {
            let proba = model.predict_proba(test_kernel)?;
            roc_auc(y_test, &proba)
        } else {
            let decisions = model.decision_function(test_kernel)?;
            roc_auc(y_test, &decisions)
        };
        let auc = auc.unwrap_or_else(|| {
            warn!(
                "AUC is undefined for a test set with a single class ({} samples)",
                y_test.len()
            );
            f64::NAN
        });

        Ok(ScoredFit {
            model,
            y_hat,
            auc,
            y_hat_train,
        })
    }

    /// Per-sample upper bound C_i
    fn box_constraints(&self, labels: &[Label], n_positive: usize) -> Vec<f64> {
        let c = self.config.c;
        let (c_pos, c_neg) = match self.config.class_weight {
            ClassWeight::Uniform => (c, c),
            ClassWeight::Balanced => {
                let n = labels.len() as f64;
                let n_negative = labels.len() - n_positive;
                (
                    c * n / (2.0 * n_positive as f64),
                    c * n / (2.0 * n_negative as f64),
                )
            }
        };
        labels
            .iter()
            .map(|&l| if l == 1 { c_pos } else { c_neg })
            .collect()
    }

    /// Decision values for every training sample from models that did not see it
    fn cross_validated_decisions(
        &self,
        kernel: &Matrix,
        y: &[f64],
        upper: &[f64],
    ) -> Result<Vec<f64>> {
        let n = y.len();
        let n_folds = self.config.probability_folds.max(2);
        let mut perm: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        perm.shuffle(&mut rng);

        let solver = SMOSolver::from_config(&self.config);
        let mut decisions = vec![0.0; n];

        for fold in 0..n_folds {
            let begin = fold * n / n_folds;
            let end = (fold + 1) * n / n_folds;
            if begin == end {
                continue;
            }

            let held_out = &perm[begin..end];
            let train: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();

            let n_pos = train.iter().filter(|&&i| y[i] > 0.0).count();
            let n_neg = train.len() - n_pos;

            if n_pos == 0 && n_neg == 0 {
                held_out.iter().for_each(|&i| decisions[i] = 0.0);
            } else if n_neg == 0 {
                held_out.iter().for_each(|&i| decisions[i] = 1.0);
            } else if n_pos == 0 {
                held_out.iter().for_each(|&i| decisions[i] = -1.0);
            } else {
                let sub_kernel = kernel.select(&train, &train);
                let sub_y: Vec<f64> = train.iter().map(|&i| y[i]).collect();
                let sub_upper: Vec<f64> = train.iter().map(|&i| upper[i]).collect();
                let sub = solver
                    .solve(&sub_kernel, &sub_y, &sub_upper)
                    .map_err(|e| e.with_context(format!("probability fold {fold}")))?;

                for &i in held_out {
                    decisions[i] = sub
                        .support_vectors
                        .iter()
                        .map(|&s| sub.alpha[s] * sub_y[s] * kernel.get(i, train[s]))
                        .sum::<f64>()
                        - sub.rho;
                }
            }
        }

        Ok(decisions)
    }
}

/// Output of `SvmClassifier::train_and_score`
#[derive(Debug, Clone)]
pub struct ScoredFit {
    pub model: TrainedSvm,
    /// Predicted test labels
    pub y_hat: Vec<Label>,
    /// Test AUC, NaN when undefined
    pub auc: f64,
    /// Predicted training labels
    pub y_hat_train: Vec<Label>,
}

/// A fitted SVM
///
/// The decision function is `sum_s dual_coef[s] * K(x, x_support[s]) + intercept`;
/// positive values predict class 1.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedSvm {
    dual_coef: Vec<f64>,
    support: Vec<usize>,
    intercept: f64,
    n_training_samples: usize,
    c: f64,
    probability: Option<PlattScaling>,
}

impl TrainedSvm {
    fn from_solution(
        result: &OptimizationResult,
        y: &[f64],
        n_training_samples: usize,
        c: f64,
        probability: Option<PlattScaling>,
    ) -> Self {
        let dual_coef = result
            .support_vectors
            .iter()
            .map(|&s| result.alpha[s] * y[s])
            .collect();

        Self {
            dual_coef,
            support: result.support_vectors.clone(),
            intercept: -result.rho,
            n_training_samples,
            c,
            probability,
        }
    }

    /// Rebuild a model from stored parts
    pub fn from_parts(
        dual_coef: Vec<f64>,
        support: Vec<usize>,
        intercept: f64,
        n_training_samples: usize,
        c: f64,
        probability: Option<PlattScaling>,
    ) -> Result<Self> {
        if dual_coef.len() != support.len() {
            return Err(CVError::DimensionMismatch {
                expected: support.len(),
                actual: dual_coef.len(),
            });
        }
        if let Some(&index) = support.iter().find(|&&s| s >= n_training_samples) {
            return Err(CVError::IndexOutOfRange {
                index,
                len: n_training_samples,
            });
        }
        Ok(Self {
            dual_coef,
            support,
            intercept,
            n_training_samples,
            c,
            probability,
        })
    }

    /// Decision values for each row of K[new, train]
    pub fn decision_function(&self, kernel: &Matrix) -> Result<Vec<f64>> {
        if kernel.cols() != self.n_training_samples {
            return Err(CVError::DimensionMismatch {
                expected: self.n_training_samples,
                actual: kernel.cols(),
            });
        }

        Ok((0..kernel.rows())
            .map(|r| {
                let row = kernel.row(r);
                self.support
                    .iter()
                    .zip(&self.dual_coef)
                    .map(|(&s, &coef)| coef * row[s])
                    .sum::<f64>()
                    + self.intercept
            })
            .collect())
    }

    /// Predicted labels: 1 when the decision value is positive, else 0
    pub fn predict(&self, kernel: &Matrix) -> Result<Vec<Label>> {
        Ok(self
            .decision_function(kernel)?
            .into_iter()
            .map(|f| if f > 0.0 { 1 } else { 0 })
            .collect())
    }

    /// Positive-class probabilities from the Platt sigmoid
    pub fn predict_proba(&self, kernel: &Matrix) -> Result<Vec<f64>> {
        let platt = self.probability.ok_or_else(|| {
            CVError::Configuration(
                "model was fitted without probability estimates".to_string(),
            )
        })?;
        Ok(self
            .decision_function(kernel)?
            .into_iter()
            .map(|f| platt.probability(f))
            .collect())
    }

    /// Primal weight vector `w = sum_s dual_coef[s] * x_s` for a linear kernel
    ///
    /// `features` holds the training samples as rows.
    pub fn feature_weights(&self, features: &Matrix) -> Result<Vec<f64>> {
        if features.rows() != self.n_training_samples {
            return Err(CVError::DimensionMismatch {
                expected: self.n_training_samples,
                actual: features.rows(),
            });
        }
        let mut weights = vec![0.0; features.cols()];
        for (&s, &coef) in self.support.iter().zip(&self.dual_coef) {
            for (w, x) in weights.iter_mut().zip(features.row(s)) {
                *w += coef * x;
            }
        }
        Ok(weights)
    }

    pub fn dual_coefficients(&self) -> &[f64] {
        &self.dual_coef
    }

    /// Indices of the support vectors in the training set
    pub fn support_indices(&self) -> &[usize] {
        &self.support
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support.len()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_training_samples(&self) -> usize {
        self.n_training_samples
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn platt(&self) -> Option<PlattScaling> {
        self.probability
    }

    pub fn has_probability(&self) -> bool {
        self.probability.is_some()
    }
}

/// Map 0/1 labels to -1/+1
pub(crate) fn signed_labels(labels: &[Label]) -> Vec<f64> {
    labels
        .iter()
        .map(|&l| if l == 1 { 1.0 } else { -1.0 })
        .collect()
}
