//! Inner grid search over the regularization strength C
//!
//! For one outer-training set the search deals the samples into stratified
//! inner folds, scores every (inner fold, candidate) cell concurrently, and
//! reduces the resulting `ScoreTable` to a single `BestParameters`.

use crate::classifier::SvmClassifier;
use crate::core::{
    BestParameters, CGrid, CVError, FoldSplit, Label, Matrix, Result, SampleSet,
};
use crate::metrics::ClassificationMetrics;
use crate::split::stratified_kfold;
use log::debug;
use rand::Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Build a short-lived pool with `n_threads` workers
pub(crate) fn thread_pool(n_threads: usize) -> Result<ThreadPool> {
    if n_threads == 0 {
        return Err(CVError::Configuration(
            "thread count must be at least 1".to_string(),
        ));
    }
    ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|e| CVError::Configuration(format!("failed to build thread pool: {e}")))
}

/// Geometric mean: 10 raised to the mean of log10 values
pub fn geometric_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mean_log = values.iter().map(|v| v.log10()).sum::<f64>() / values.len() as f64;
    10f64.powf(mean_log)
}

/// Balanced accuracy of every (inner fold, candidate) cell
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    n_folds: usize,
    n_candidates: usize,
    scores: Vec<f64>,
}

impl ScoreTable {
    /// `scores` is row-major: fold-major, candidates in grid order
    pub fn new(n_folds: usize, n_candidates: usize, scores: Vec<f64>) -> Result<Self> {
        if scores.len() != n_folds * n_candidates {
            return Err(CVError::DimensionMismatch {
                expected: n_folds * n_candidates,
                actual: scores.len(),
            });
        }
        Ok(Self {
            n_folds,
            n_candidates,
            scores,
        })
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    pub fn n_candidates(&self) -> usize {
        self.n_candidates
    }

    pub fn get(&self, fold: usize, candidate: usize) -> f64 {
        self.scores[fold * self.n_candidates + candidate]
    }

    /// Candidate index and score of the fold winner
    ///
    /// Candidates are visited in grid order from a best of -1; a candidate
    /// only replaces the best when it scores strictly higher, so the first
    /// of several tied candidates wins.
    pub fn fold_winner(&self, fold: usize) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut best_score = -1.0;
        for candidate in 0..self.n_candidates {
            let score = self.get(fold, candidate);
            if score > best_score {
                best_score = score;
                best = Some((candidate, score));
            }
        }
        best
    }

    /// Reduce to the geometric mean of the fold winners' C and the
    /// arithmetic mean of their scores
    pub fn select_best(&self, grid: &CGrid) -> Result<BestParameters> {
        if self.n_candidates != grid.len() {
            return Err(CVError::DimensionMismatch {
                expected: grid.len(),
                actual: self.n_candidates,
            });
        }
        if self.n_folds == 0 {
            return Err(CVError::Configuration(
                "no inner folds to select a parameter from".to_string(),
            ));
        }

        let mut winners_c = Vec::with_capacity(self.n_folds);
        let mut winners_score = Vec::with_capacity(self.n_folds);
        for fold in 0..self.n_folds {
            let (candidate, score) = self.fold_winner(fold).ok_or_else(|| {
                CVError::Configuration(format!("inner fold {fold} produced no candidate"))
            })?;
            winners_c.push(grid.values()[candidate]);
            winners_score.push(score);
        }

        Ok(BestParameters {
            c: geometric_mean(&winners_c),
            balanced_accuracy: winners_score.iter().sum::<f64>() / winners_score.len() as f64,
        })
    }
}

/// Kernel slices and labels for one inner fold
struct InnerFold {
    train_kernel: Matrix,
    test_kernel: Matrix,
    y_train: Vec<Label>,
    y_test: Vec<Label>,
}

/// Grid search configuration
#[derive(Debug, Clone)]
pub struct GridSearch {
    c_grid: CGrid,
    inner_folds: usize,
    inner_threads: usize,
    classifier: SvmClassifier,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self {
            c_grid: CGrid::default(),
            inner_folds: 10,
            inner_threads: 15,
            classifier: SvmClassifier::default(),
        }
    }
}

impl GridSearch {
    pub fn new(c_grid: CGrid, inner_folds: usize) -> Self {
        Self {
            c_grid,
            inner_folds,
            ..Self::default()
        }
    }

    pub fn with_inner_threads(mut self, inner_threads: usize) -> Self {
        self.inner_threads = inner_threads;
        self
    }

    /// Base trainer used for every cell; C is overridden per candidate
    pub fn with_classifier(mut self, classifier: SvmClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn c_grid(&self) -> &CGrid {
        &self.c_grid
    }

    pub fn inner_folds(&self) -> usize {
        self.inner_folds
    }

    /// Stratified inner folds of `outer_train`, as positions into the full sample set
    pub fn inner_splits<R: Rng + ?Sized>(
        &self,
        outer_train: &[usize],
        labels: &[Label],
        rng: &mut R,
    ) -> Result<Vec<FoldSplit>> {
        if let Some(&index) = outer_train.iter().find(|&&i| i >= labels.len()) {
            return Err(CVError::IndexOutOfRange {
                index,
                len: labels.len(),
            });
        }
        let y_outer: Vec<Label> = outer_train.iter().map(|&i| labels[i]).collect();
        let local = stratified_kfold(&y_outer, self.inner_folds, rng)?;

        Ok(local
            .into_iter()
            .map(|split| {
                FoldSplit::new(
                    split.train.iter().map(|&i| outer_train[i]).collect(),
                    split.test.iter().map(|&i| outer_train[i]).collect(),
                )
            })
            .collect())
    }

    /// Select C for one outer-training set
    pub fn search<S: SampleSet, R: Rng + ?Sized>(
        &self,
        samples: &S,
        labels: &[Label],
        outer_train: &[usize],
        rng: &mut R,
    ) -> Result<BestParameters> {
        if self.c_grid.is_empty() {
            return Err(CVError::Configuration(
                "the C grid must contain at least one candidate".to_string(),
            ));
        }
        let splits = self.inner_splits(outer_train, labels, rng)?;
        let table = self.score(samples, labels, &splits)?;
        let best = table.select_best(&self.c_grid)?;

        debug!(
            "Inner search over {} folds x {} candidates selected C={:.3e} (balanced accuracy {:.4})",
            table.n_folds(),
            table.n_candidates(),
            best.c,
            best.balanced_accuracy
        );
        Ok(best)
    }

    /// Fill the score table for the given inner splits
    pub fn score<S: SampleSet>(
        &self,
        samples: &S,
        labels: &[Label],
        splits: &[FoldSplit],
    ) -> Result<ScoreTable> {
        if labels.len() != samples.len() {
            return Err(CVError::DimensionMismatch {
                expected: samples.len(),
                actual: labels.len(),
            });
        }
        let folds: Vec<InnerFold> = splits
            .iter()
            .enumerate()
            .map(|(fold, split)| {
                if split.train.is_empty() || split.test.is_empty() {
                    return Err(CVError::Configuration(format!(
                        "inner fold {fold} is empty"
                    )));
                }
                split
                    .validate(samples.len())
                    .map_err(|e| e.with_context(format!("inner fold {fold}")))?;
                Ok(InnerFold {
                    train_kernel: samples.kernel_slice(&split.train, &split.train),
                    test_kernel: samples.kernel_slice(&split.test, &split.train),
                    y_train: split.train.iter().map(|&i| labels[i]).collect(),
                    y_test: split.test.iter().map(|&i| labels[i]).collect(),
                })
            })
            .collect::<Result<_>>()?;

        let candidates = self.c_grid.values();
        let n_candidates = candidates.len();
        let pool = thread_pool(self.inner_threads)?;

        let scores: Vec<f64> = pool.install(|| {
            (0..folds.len() * n_candidates)
                .into_par_iter()
                .map(|cell| {
                    let fold = cell / n_candidates;
                    let c = candidates[cell % n_candidates];
                    self.score_cell(&folds[fold], c)
                        .map_err(|e| e.with_context(format!("inner fold {fold}, C={c:e}")))
                })
                .collect::<Result<Vec<f64>>>()
        })?;

        ScoreTable::new(folds.len(), n_candidates, scores)
    }

    fn score_cell(&self, fold: &InnerFold, c: f64) -> Result<f64> {
        let model = self
            .classifier
            .clone()
            .with_c(c)
            .with_probability(false)
            .fit(&fold.train_kernel, &fold.y_train)?;
        let y_hat = model.predict(&fold.test_kernel)?;
        Ok(ClassificationMetrics::evaluate(&fold.y_test, &y_hat).balanced_accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::FeatureSpace;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn dataset() -> (FeatureSpace, Vec<Label>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            let t = i as f64 / 15.0;
            rows.push(vec![1.0 + t, 0.5 - t]);
            labels.push(1);
            rows.push(vec![-1.0 - t, -0.5 + t]);
            labels.push(0);
        }
        let features = Matrix::from_rows(rows).expect("rectangular");
        (FeatureSpace::new(features).expect("features"), labels)
    }

    #[test]
    fn test_geometric_mean() {
        assert_relative_eq!(geometric_mean(&[10.0, 100.0, 1000.0]), 100.0, max_relative = 1e-12);
        assert_relative_eq!(geometric_mean(&[0.01]), 0.01, max_relative = 1e-12);
        assert!(geometric_mean(&[]).is_nan());
    }

    #[test]
    fn test_strict_improvement_keeps_first_tie() {
        let grid = CGrid::new(vec![0.1, 1.0, 10.0]).expect("grid");
        let table = ScoreTable::new(1, 3, vec![0.8, 0.9, 0.9]).expect("table");
        assert_eq!(table.fold_winner(0), Some((1, 0.9)));

        let best = table.select_best(&grid).expect("best");
        assert_eq!(best.c, 1.0);
        assert_eq!(best.balanced_accuracy, 0.9);
    }

    #[test]
    fn test_select_best_aggregates_across_folds() {
        let grid = CGrid::new(vec![0.01, 1.0, 100.0]).expect("grid");
        // Winners: 0.01 (0.7), 100 (0.9)
        let table = ScoreTable::new(2, 3, vec![0.7, 0.6, 0.5, 0.2, 0.3, 0.9]).expect("table");
        let best = table.select_best(&grid).expect("best");
        assert_relative_eq!(best.c, 1.0, max_relative = 1e-12);
        assert_relative_eq!(best.balanced_accuracy, 0.8, max_relative = 1e-12);
    }

    #[test]
    fn test_score_table_shape_is_checked() {
        assert!(ScoreTable::new(2, 3, vec![0.0; 5]).is_err());
        let table = ScoreTable::new(1, 2, vec![0.5, 0.5]).expect("table");
        let grid = CGrid::new(vec![1.0]).expect("grid");
        assert!(table.select_best(&grid).is_err());
    }

    #[test]
    fn test_inner_splits_stay_inside_outer_train() {
        let (_, labels) = dataset();
        let outer_train: Vec<usize> = (0..labels.len()).filter(|i| i % 3 != 0).collect();
        let outer_test: HashSet<usize> = (0..labels.len()).filter(|i| i % 3 == 0).collect();

        let search = GridSearch::new(CGrid::default(), 4);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let splits = search
            .inner_splits(&outer_train, &labels, &mut rng)
            .expect("inner splits");

        assert_eq!(splits.len(), 4);
        let mut union: Vec<usize> = Vec::new();
        for split in &splits {
            assert!(split.train.iter().all(|i| !outer_test.contains(i)));
            assert!(split.test.iter().all(|i| !outer_test.contains(i)));
            union.extend(&split.test);
        }
        union.sort_unstable();
        assert_eq!(union, outer_train);
    }

    #[test]
    fn test_search_selects_grid_value_on_separable_data() {
        let (space, labels) = dataset();
        let outer_train: Vec<usize> = (0..labels.len()).collect();
        let grid = CGrid::new(vec![0.1, 1.0, 10.0]).expect("grid");
        let search = GridSearch::new(grid, 3).with_inner_threads(2);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let best = search
            .search(&space, &labels, &outer_train, &mut rng)
            .expect("search");

        assert!(best.c >= 0.1 && best.c <= 10.0);
        assert_relative_eq!(best.balanced_accuracy, 1.0);
    }

    #[test]
    fn test_search_rejects_too_many_inner_folds() {
        let (space, labels) = dataset();
        let outer_train: Vec<usize> = (0..6).collect();
        let search = GridSearch::new(CGrid::default(), 10);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = search.search(&space, &labels, &outer_train, &mut rng);
        assert!(matches!(result, Err(CVError::Configuration(_))));
    }

    #[test]
    fn test_out_of_range_indices_are_data_errors() {
        let (space, labels) = dataset();
        let search = GridSearch::new(CGrid::new(vec![1.0]).expect("grid"), 3);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let outer_train = vec![0, 1, 2, 3, 4, 5, 99];
        let err = search
            .inner_splits(&outer_train, &labels, &mut rng)
            .unwrap_err();
        assert!(matches!(err, CVError::IndexOutOfRange { index: 99, .. }));

        let splits = vec![FoldSplit::new(vec![0, 1, 2, 3], vec![4, 99])];
        let err = search.score(&space, &labels, &splits).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::Data);
        assert!(err.to_string().contains("inner fold 0"));

        let err = search.score(&space, &labels[..5], &splits).unwrap_err();
        assert!(matches!(err, CVError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_zero_threads_is_configuration_error() {
        assert!(matches!(thread_pool(0), Err(CVError::Configuration(_))));
    }
}
