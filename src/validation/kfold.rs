//! Stratified k-fold outer validation

use crate::core::{
    validate_splits, BestParameters, CVError, Evaluable, FoldSplit, OuterFoldResult, Result,
    Validatable, ValidationOutcome,
};
use crate::split::stratified_kfold;
use crate::validation::{run_outer_splits, write_tsv, FoldMetricsRow, SubjectRow};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::Path;

/// K-fold cross-validation around any `Evaluable`
#[derive(Debug)]
pub struct KFoldValidation<E: Evaluable> {
    algorithm: E,
    n_folds: usize,
    outer_threads: usize,
    seed: u64,
    results: Option<Vec<OuterFoldResult>>,
    best_parameters: Option<BestParameters>,
}

impl<E: Evaluable> KFoldValidation<E> {
    pub fn new(algorithm: E, n_folds: usize) -> Self {
        Self {
            algorithm,
            n_folds,
            outer_threads: 15,
            seed: 0,
            results: None,
            best_parameters: None,
        }
    }

    pub fn with_outer_threads(mut self, outer_threads: usize) -> Self {
        self.outer_threads = outer_threads;
        self
    }

    /// Seed for the generated outer folds
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn algorithm(&self) -> &E {
        &self.algorithm
    }

    /// Per-fold results of the last `validate` call
    pub fn results(&self) -> Option<&[OuterFoldResult]> {
        self.results.as_deref()
    }

    pub fn best_parameters(&self) -> Option<BestParameters> {
        self.best_parameters
    }

    /// The outer folds `validate` would generate
    pub fn generate_splits(&self) -> Result<Vec<FoldSplit>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        stratified_kfold(self.algorithm.labels(), self.n_folds, &mut rng)
    }
}

impl<E: Evaluable> Validatable for KFoldValidation<E> {
    type Model = E::Model;

    fn validate(&mut self, splits: Option<Vec<FoldSplit>>) -> Result<ValidationOutcome<E::Model>> {
        let n = self.algorithm.labels().len();
        let splits = match splits {
            Some(splits) => {
                validate_splits(&splits, n, self.n_folds)?;
                splits
            }
            None => self.generate_splits()?,
        };

        info!(
            "Running {}-fold nested cross-validation on {n} samples",
            splits.len()
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

        let folds_dir = output_dir.join("folds");
        fs::create_dir_all(&folds_dir)?;

        let mut all_subjects = Vec::new();
        let mut all_metrics = Vec::with_capacity(results.len());
        for (i, result) in results.iter().enumerate() {
            let subjects = SubjectRow::from_result(result);
            write_tsv(folds_dir.join(format!("subjects_fold-{i}.tsv")), &subjects)?;
            all_subjects.extend(subjects);

            let metrics = FoldMetricsRow::from_result(result);
            write_tsv(folds_dir.join(format!("results_fold-{i}.tsv")), &[metrics])?;
            all_metrics.push(metrics);
        }

        write_tsv(output_dir.join("subjects.tsv"), &all_subjects)?;
        write_tsv(output_dir.join("results.tsv"), &all_metrics)?;

        let mean = FoldMetricsRow::mean(&all_metrics);
        write_tsv(output_dir.join("mean_results.tsv"), &[mean])?;
        mean.log_summary();
        Ok(())
    }
}
