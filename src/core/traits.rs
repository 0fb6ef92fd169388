//! Core traits for nested cross-validation

use crate::core::{BestParameters, FoldSplit, Label, Matrix, OuterFoldResult, Result};
use std::path::Path;

/// Sample set abstraction: anything that can produce kernel slices
/// `K[rows, cols]` over its samples.
pub trait SampleSet: Send + Sync {
    /// Number of samples
    fn len(&self) -> usize;

    /// Kernel values between the `rows` samples and the `cols` samples
    ///
    /// # Panics
    /// Panics if any index is >= len()
    fn kernel_slice(&self, rows: &[usize], cols: &[usize]) -> Matrix;

    /// Raw feature matrix, when the sample set has one
    fn features(&self) -> Option<&Matrix> {
        None
    }

    /// Check if the sample set is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something that can be evaluated on one outer split and can turn a set of
/// per-fold selections into one final model.
pub trait Evaluable: Send + Sync {
    /// Final model type produced by `apply_best_parameters`
    type Model;

    /// Labels of the full sample set, used to generate stratified splits
    fn labels(&self) -> &[Label];

    /// Run the inner search on `split.train`, refit, and score on `split.test`
    fn evaluate(&self, fold: usize, split: &FoldSplit) -> Result<OuterFoldResult>;

    /// Aggregate per-fold selections and refit on the whole sample set
    fn apply_best_parameters(
        &self,
        results: &[OuterFoldResult],
    ) -> Result<(Self::Model, BestParameters)>;
}

/// Result of a validation run
#[derive(Debug, Clone)]
pub struct ValidationOutcome<M> {
    /// Model refit on the whole sample set with the aggregated C
    pub model: M,
    pub best_parameters: BestParameters,
    /// Per-fold (or per-iteration) results in split order
    pub results: Vec<OuterFoldResult>,
}

/// An outer resampling strategy
pub trait Validatable {
    type Model;

    /// Run every outer split (generating them when `splits` is `None`) and
    /// aggregate into a final model
    fn validate(&mut self, splits: Option<Vec<FoldSplit>>)
        -> Result<ValidationOutcome<Self::Model>>;

    /// Write per-split and aggregate tables under `output_dir`
    fn save_results(&self, output_dir: &Path) -> Result<()>;
}
