//! Repeated stratified holdout with resampled-t variance

use crate::core::{
    validate_splits, BestParameters, CVError, Evaluable, FoldSplit, OuterFoldResult, Result,
    Validatable, ValidationOutcome,
};
use crate::split::stratified_shuffle_split;
use crate::validation::{
    holdout_variance, run_outer_splits, write_tsv, HoldoutVariance, IterationMetricsRow,
    IterationSubjectRow, VarianceRow,
};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::Path;

/// Whether hyperparameters are selected inside each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Inner grid search on each outer-training set
    #[default]
    Nested,
    /// Selection on the same data used for evaluation; always rejected
    NonNested,
}

/// Repeated holdout around any `Evaluable`
#[derive(Debug)]
pub struct RepeatedHoldout<E: Evaluable> {
    algorithm: E,
    n_iterations: usize,
    test_size: f64,
    selection: SelectionMode,
    outer_threads: usize,
    seed: u64,
    results: Option<Vec<OuterFoldResult>>,
    best_parameters: Option<BestParameters>,
}

impl<E: Evaluable> RepeatedHoldout<E> {
    pub fn new(algorithm: E, n_iterations: usize, test_size: f64) -> Self {
        Self {
            algorithm,
            n_iterations,
            test_size,
            selection: SelectionMode::Nested,
            outer_threads: 15,
            seed: 0,
            results: None,
            best_parameters: None,
        }
    }

    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_outer_threads(mut self, outer_threads: usize) -> Self {
        self.outer_threads = outer_threads;
        self
    }

    /// Seed for the generated outer splits
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn algorithm(&self) -> &E {
        &self.algorithm
    }

    pub fn results(&self) -> Option<&[OuterFoldResult]> {
        self.results.as_deref()
    }

    pub fn best_parameters(&self) -> Option<BestParameters> {
        self.best_parameters
    }

    pub fn test_size(&self) -> f64 {
        self.test_size
    }

    /// The outer splits `validate` would generate
    pub fn generate_splits(&self) -> Result<Vec<FoldSplit>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        stratified_shuffle_split(
            self.algorithm.labels(),
            self.n_iterations,
            self.test_size,
            &mut rng,
        )
    }

    /// Error-rate and balanced-accuracy variance over the validated iterations
    pub fn estimate_variance(&self) -> Result<HoldoutVariance> {
        let results = self.results.as_ref().ok_or(CVError::NotValidated)?;
        holdout_variance(results, self.test_size)
    }
}

impl<E: Evaluable> Validatable for RepeatedHoldout<E> {
    type Model = E::Model;

    fn validate(&mut self, splits: Option<Vec<FoldSplit>>) -> Result<ValidationOutcome<E::Model>> {
        if self.selection == SelectionMode::NonNested {
            return Err(CVError::Configuration(
                "repeated holdout always runs the nested search; non-nested selection is not supported"
                    .to_string(),
            ));
        }

        let n = self.algorithm.labels().len();
        let splits = match splits {
            Some(splits) => {
                validate_splits(&splits, n, self.n_iterations)?;
                splits
            }
            None => self.generate_splits()?,
        };

        info!(
            "Running {} nested holdout iterations (test size {}) on {n} samples",
            splits.len(),
            self.test_size
        );
        let results = run_outer_splits(&self.algorithm, &splits, self.outer_threads)?;
        let (model, best_parameters) = self.algorithm.apply_best_parameters(&results)?;

        self.results = Some(results.clone());
        self.best_parameters = Some(best_parameters);

        Ok(ValidationOutcome {
            model,
            best_parameters,
            results,
        })
    }

    fn save_results(&self, output_dir: &Path) -> Result<()> {
        let results = self.results.as_ref().ok_or(CVError::NotValidated)?;
        fs::create_dir_all(output_dir)?;

        let mut all_train = Vec::new();
        let mut all_test = Vec::new();
        let mut all_metrics = Vec::with_capacity(results.len());

        for (iteration, result) in results.iter().enumerate() {
            let iteration_dir = output_dir.join(format!("iteration-{iteration}"));
            fs::create_dir_all(&iteration_dir)?;

            let train = IterationSubjectRow::train_rows(result);
            write_tsv(iteration_dir.join("train_subjects.tsv"), &train)?;
            all_train.extend(train);

            let test = IterationSubjectRow::test_rows(result);
            write_tsv(iteration_dir.join("test_subjects.tsv"), &test)?;
            all_test.extend(test);

            let metrics = IterationMetricsRow::from_result(result);
            write_tsv(iteration_dir.join("results.tsv"), &[metrics])?;
            all_metrics.push(metrics);
        }

        write_tsv(output_dir.join("train_subjects.tsv"), &all_train)?;
        write_tsv(output_dir.join("test_subjects.tsv"), &all_test)?;
        write_tsv(output_dir.join("results.tsv"), &all_metrics)?;

        let mean = IterationMetricsRow::mean(&all_metrics);
        write_tsv(output_dir.join("mean_results.tsv"), &[mean])?;
        mean.test_metrics().log_summary();

        let variance = self.estimate_variance()?;
        write_tsv(
            output_dir.join("variance.tsv"),
            &[VarianceRow::from(&variance)],
        )?;
        Ok(())
    }
}
