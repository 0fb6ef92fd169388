//! Nested cross-validation for linear Support Vector Machines
//!
//! Hyperparameter C is chosen by an inner stratified grid search on each
//! outer-training set, so held-out samples never influence model selection.
//! Outer resampling is either stratified k-fold or repeated stratified holdout;
//! the final model is refit on all samples with the geometric mean of the
//! per-fold selections.

pub mod api;
pub mod classifier;
pub mod core;
pub mod data;
pub mod kernel;
pub mod metrics;
pub mod persistence;
pub mod search;
pub mod solver;
pub mod split;
pub mod validation;

// Re-export main types for convenience
pub use crate::api::{run_kfold, run_repeated_holdout, NestedConfig};
pub use crate::classifier::{ScoredFit, SvmClassifier, TrainedSvm};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{CVError, ErrorKind, Matrix, Result};
pub use crate::data::{Dataset, LibSVMDataset};
pub use crate::kernel::{FeatureSpace, LinearKernel, PrecomputedKernel};
pub use crate::metrics::ClassificationMetrics;
pub use crate::search::GridSearch;
pub use crate::validation::{KFoldValidation, NestedLinearSvm, RepeatedHoldout};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
