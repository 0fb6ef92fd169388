//! High-level API for nested cross-validation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use nestsvm::api::{KFoldWorkflow, NestedConfig};
//! use nestsvm::data::Dataset;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = Dataset::from_file("data.csv")?;
//! let config = NestedConfig::new().with_inner_folds(5).with_seed(42);
//!
//! let outcome = KFoldWorkflow::new(dataset, "results", config)
//!     .with_n_folds(5)
//!     .run(None)?;
//! println!("Selected C = {}", outcome.best_parameters.c);
//! # Ok(())
//! # }
//! ```

use crate::classifier::TrainedSvm;
use crate::core::{
    CGrid, ClassWeight, FoldSplit, Label, Matrix, Result, SampleSet, Validatable,
    ValidationOutcome,
};
use crate::data::Dataset;
use crate::kernel::FeatureSpace;
use crate::persistence::save_classifier;
use crate::search::GridSearch;
use crate::validation::{KFoldValidation, NestedLinearSvm, RepeatedHoldout};
use log::info;
use std::path::{Path, PathBuf};

/// Settings shared by both outer strategies
#[derive(Debug, Clone)]
pub struct NestedConfig {
    pub c_grid: CGrid,
    pub inner_folds: usize,
    pub class_weight: ClassWeight,
    /// Workers for the (inner fold, candidate) cells of one search
    pub inner_threads: usize,
    /// Workers for concurrent outer splits
    pub outer_threads: usize,
    /// Base seed; drawn at random when `None`
    pub seed: Option<u64>,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self {
            c_grid: CGrid::default(),
            inner_folds: 10,
            class_weight: ClassWeight::Balanced,
            inner_threads: 15,
            outer_threads: 15,
            seed: None,
        }
    }
}

impl NestedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_c_grid(mut self, c_grid: CGrid) -> Self {
        self.c_grid = c_grid;
        self
    }

    pub fn with_inner_folds(mut self, inner_folds: usize) -> Self {
        self.inner_folds = inner_folds;
        self
    }

    /// `true` scales C per class by n / (2 n_k)
    pub fn with_balanced(mut self, balanced: bool) -> Self {
        self.class_weight = if balanced {
            ClassWeight::Balanced
        } else {
            ClassWeight::Uniform
        };
        self
    }

    /// Use the same worker count for both pools
    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.inner_threads = n_threads;
        self.outer_threads = n_threads;
        self
    }

    pub fn with_inner_threads(mut self, inner_threads: usize) -> Self {
        self.inner_threads = inner_threads;
        self
    }

    pub fn with_outer_threads(mut self, outer_threads: usize) -> Self {
        self.outer_threads = outer_threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The configured seed, or a fresh random one (logged so runs can be repeated)
    pub fn resolve_seed(&self) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random::<u64>();
                info!("No seed given, using random seed {seed}");
                seed
            }
        }
    }

    /// Build the nested algorithm over `samples`
    pub fn algorithm<S: SampleSet>(
        &self,
        samples: S,
        labels: Vec<Label>,
        seed: u64,
    ) -> Result<NestedLinearSvm<S>> {
        let search = GridSearch::new(self.c_grid.clone(), self.inner_folds)
            .with_inner_threads(self.inner_threads);
        Ok(NestedLinearSvm::new(samples, labels)?
            .with_class_weight(self.class_weight)
            .with_search(search)
            .with_seed(seed))
    }
}

/// Nested repeated holdout on any sample set
pub fn run_repeated_holdout<S: SampleSet>(
    samples: S,
    labels: Vec<Label>,
    outer_splits: Option<Vec<FoldSplit>>,
    n_iterations: usize,
    test_size: f64,
    config: &NestedConfig,
) -> Result<ValidationOutcome<TrainedSvm>> {
    let seed = config.resolve_seed();
    let algorithm = config.algorithm(samples, labels, seed)?;
    RepeatedHoldout::new(algorithm, n_iterations, test_size)
        .with_outer_threads(config.outer_threads)
        .with_seed(seed)
        .validate(outer_splits)
}

/// Nested k-fold on any sample set
pub fn run_kfold<S: SampleSet>(
    samples: S,
    labels: Vec<Label>,
    outer_splits: Option<Vec<FoldSplit>>,
    n_folds: usize,
    config: &NestedConfig,
) -> Result<ValidationOutcome<TrainedSvm>> {
    let seed = config.resolve_seed();
    let algorithm = config.algorithm(samples, labels, seed)?;
    KFoldValidation::new(algorithm, n_folds)
        .with_outer_threads(config.outer_threads)
        .with_seed(seed)
        .validate(outer_splits)
}

/// Write classifier artifacts under `output_dir/classifier`
fn save_final_model(
    output_dir: &Path,
    outcome: &ValidationOutcome<TrainedSvm>,
    features: &Matrix,
) -> Result<()> {
    let classifier_dir = output_dir.join("classifier");
    save_classifier(
        &classifier_dir,
        &outcome.model,
        &outcome.best_parameters,
        Some(features),
    )?;
    info!(
        "Saved classifier to {}; positive weights favour class 1 and negative weights class 0",
        classifier_dir.display()
    );
    Ok(())
}

/// Feature-matrix repeated holdout: validate, then write tables and artifacts
#[derive(Debug, Clone)]
pub struct HoldoutWorkflow {
    dataset: Dataset,
    output_dir: PathBuf,
    config: NestedConfig,
    n_iterations: usize,
    test_size: f64,
}

impl HoldoutWorkflow {
    pub fn new<P: Into<PathBuf>>(dataset: Dataset, output_dir: P, config: NestedConfig) -> Self {
        Self {
            dataset,
            output_dir: output_dir.into(),
            config,
            n_iterations: 100,
            test_size: 0.2,
        }
    }

    pub fn with_n_iterations(mut self, n_iterations: usize) -> Self {
        self.n_iterations = n_iterations;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn run(self, splits: Option<Vec<FoldSplit>>) -> Result<ValidationOutcome<TrainedSvm>> {
        let seed = self.config.resolve_seed();
        let (features, labels) = self.dataset.into_parts();
        let kernel = FeatureSpace::new(features.clone())?.precompute()?;

        let algorithm = self.config.algorithm(kernel, labels, seed)?;
        let mut validation = RepeatedHoldout::new(algorithm, self.n_iterations, self.test_size)
            .with_outer_threads(self.config.outer_threads)
            .with_seed(seed);

        let outcome = validation.validate(splits)?;
        std::fs::create_dir_all(&self.output_dir)?;
        save_final_model(&self.output_dir, &outcome, &features)?;
        validation.save_results(&self.output_dir)?;
        Ok(outcome)
    }
}

/// Feature-matrix k-fold: validate, then write tables and artifacts
#[derive(Debug, Clone)]
pub struct KFoldWorkflow {
    dataset: Dataset,
    output_dir: PathBuf,
    config: NestedConfig,
    n_folds: usize,
}

impl KFoldWorkflow {
    pub fn new<P: Into<PathBuf>>(dataset: Dataset, output_dir: P, config: NestedConfig) -> Self {
        Self {
            dataset,
            output_dir: output_dir.into(),
            config,
            n_folds: 10,
        }
    }

    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn run(self, splits: Option<Vec<FoldSplit>>) -> Result<ValidationOutcome<TrainedSvm>> {
        let seed = self.config.resolve_seed();
        let (features, labels) = self.dataset.into_parts();
        let kernel = FeatureSpace::new(features.clone())?.precompute()?;

        let algorithm = self.config.algorithm(kernel, labels, seed)?;
        let mut validation = KFoldValidation::new(algorithm, self.n_folds)
            .with_outer_threads(self.config.outer_threads)
            .with_seed(seed);

        let outcome = validation.validate(splits)?;
        std::fs::create_dir_all(&self.output_dir)?;
        save_final_model(&self.output_dir, &outcome, &features)?;
        validation.save_results(&self.output_dir)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CVError, ErrorKind};
    use crate::kernel::PrecomputedKernel;
    use tempfile::tempdir;

    fn dataset() -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let t = i as f64 / 10.0;
            rows.push(vec![1.0 + t, 0.2, -t]);
            labels.push(1);
            rows.push(vec![-1.0 - t, 0.1, t]);
            labels.push(0);
        }
        Dataset::new(Matrix::from_rows(rows).expect("rows"), labels).expect("dataset")
    }

    fn config() -> NestedConfig {
        NestedConfig::new()
            .with_c_grid(CGrid::new(vec![0.1, 1.0]).expect("grid"))
            .with_inner_folds(3)
            .with_threads(2)
            .with_seed(11)
    }

    #[test]
    fn test_config_builder() {
        let config = NestedConfig::new()
            .with_balanced(false)
            .with_inner_threads(3)
            .with_outer_threads(4)
            .with_seed(9);
        assert_eq!(config.class_weight, ClassWeight::Uniform);
        assert_eq!(config.inner_threads, 3);
        assert_eq!(config.outer_threads, 4);
        assert_eq!(config.resolve_seed(), 9);
        assert_eq!(NestedConfig::default().c_grid.len(), 17);
    }

    #[test]
    fn test_run_kfold_is_deterministic_for_a_seed() {
        let (features, labels) = dataset().into_parts();
        let kernel: PrecomputedKernel = FeatureSpace::new(features)
            .expect("features")
            .precompute()
            .expect("gram");

        let a = run_kfold(kernel.clone(), labels.clone(), None, 4, &config()).expect("first run");
        let b = run_kfold(kernel, labels, None, 4, &config()).expect("second run");

        assert_eq!(a.best_parameters, b.best_parameters);
        assert_eq!(a.model, b.model);
        let folds_a: Vec<_> = a.results.iter().map(|r| r.test_index.clone()).collect();
        let folds_b: Vec<_> = b.results.iter().map(|r| r.test_index.clone()).collect();
        assert_eq!(folds_a, folds_b);
    }

    #[test]
    fn test_run_repeated_holdout_on_features() {
        let (features, labels) = dataset().into_parts();
        let space = FeatureSpace::new(features).expect("features");
        let outcome =
            run_repeated_holdout(space, labels, None, 2, 0.25, &config()).expect("holdout");
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.model.n_training_samples(), 20);
    }

    #[test]
    fn test_run_with_mismatched_labels_is_data_error() {
        let (features, mut labels) = dataset().into_parts();
        labels.truncate(5);
        let space = FeatureSpace::new(features).expect("features");
        let err = run_kfold(space, labels, None, 3, &config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn test_kfold_workflow_writes_artifacts() {
        let dir = tempdir().expect("Failed to create temp dir");
        let outcome = KFoldWorkflow::new(dataset(), dir.path(), config())
            .with_n_folds(4)
            .run(None)
            .expect("workflow");

        assert_eq!(outcome.results.len(), 4);
        for file in ["model.json", "best_parameters.json", "weights.json"] {
            assert!(dir.path().join("classifier").join(file).exists());
        }
        assert!(dir.path().join("mean_results.tsv").exists());
        assert!(dir.path().join("folds/results_fold-3.tsv").exists());
    }

    #[test]
    fn test_single_iteration_holdout_still_saves_classifier() {
        let dir = tempdir().expect("Failed to create temp dir");
        let err = HoldoutWorkflow::new(dataset(), dir.path(), config())
            .with_n_iterations(1)
            .with_test_size(0.25)
            .run(None)
            .unwrap_err();

        // The variance estimate needs two iterations
        assert_eq!(err.kind(), ErrorKind::Configuration);
        for file in ["model.json", "best_parameters.json", "weights.json"] {
            assert!(dir.path().join("classifier").join(file).exists(), "missing {file}");
        }
        assert!(dir.path().join("iteration-0/results.tsv").exists());
    }

    #[test]
    fn test_holdout_workflow_rejects_bad_split_count() {
        let dir = tempdir().expect("Failed to create temp dir");
        let splits = vec![FoldSplit::new((5..20).collect(), (0..5).collect())];
        let err = HoldoutWorkflow::new(dataset(), dir.path(), config())
            .with_n_iterations(3)
            .run(Some(splits))
            .unwrap_err();
        assert!(matches!(err, CVError::Configuration(_)));
    }
}
