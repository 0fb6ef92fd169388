//! Outer validation strategies and their reports
//!
//! A strategy owns an `Evaluable` algorithm, produces (or accepts) the outer
//! partition, runs every split on a bounded set of workers and aggregates
//! the per-split selections into one final model.

pub mod algorithm;
pub mod holdout;
pub mod kfold;
pub mod report;
pub mod variance;

pub use self::algorithm::*;
pub use self::holdout::*;
pub use self::kfold::*;
pub use self::report::*;
pub use self::variance::*;

use crate::core::{CVError, Evaluable, FoldSplit, OuterFoldResult, Result};
use log::info;
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// Evaluate every split with at most `outer_threads` running at once;
/// results come back in split order
///
/// Workers are plain scoped threads, not rayon workers, so a fold blocked on
/// its inner pool never picks up another fold. Once a fold fails no new
/// folds start, and the error of the lowest failing fold is returned.
pub(crate) fn run_outer_splits<E: Evaluable>(
    algorithm: &E,
    splits: &[FoldSplit],
    outer_threads: usize,
) -> Result<Vec<OuterFoldResult>> {
    if outer_threads == 0 {
        return Err(CVError::Configuration(
            "thread count must be at least 1".to_string(),
        ));
    }

    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let n_workers = outer_threads.min(splits.len()).max(1);

    let worker = || {
        let mut done = Vec::new();
        while !failed.load(Ordering::SeqCst) {
            let fold = next.fetch_add(1, Ordering::SeqCst);
            let Some(split) = splits.get(fold) else {
                break;
            };
            info!(
                "Running outer split {fold} ({} train / {} test)",
                split.train.len(),
                split.test.len()
            );
            let result = algorithm.evaluate(fold, split);
            if result.is_err() {
                failed.store(true, Ordering::SeqCst);
            }
            done.push((fold, result));
        }
        done
    };

    let finished: Vec<(usize, Result<OuterFoldResult>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..n_workers).map(|_| scope.spawn(worker)).collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_else(|p| panic::resume_unwind(p)))
            .collect()
    });

    let mut slots: Vec<Option<OuterFoldResult>> = (0..splits.len()).map(|_| None).collect();
    let mut first_error: Option<(usize, CVError)> = None;
    for (fold, result) in finished {
        match result {
            Ok(outcome) => slots[fold] = Some(outcome),
            Err(e) => {
                if first_error.as_ref().map_or(true, |(f, _)| fold < *f) {
                    first_error = Some((fold, e));
                }
            }
        }
    }
    if let Some((_, e)) = first_error {
        return Err(e);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(fold, slot)| {
            slot.ok_or_else(|| CVError::Configuration(format!("outer split {fold} was not run")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TrainedSvm;
    use crate::core::{BestParameters, CGrid, Label, Matrix, Validatable};
    use crate::kernel::FeatureSpace;
    use crate::search::GridSearch;

    /// Records how many `evaluate` calls are in flight at once
    struct InFlight<E> {
        inner: E,
        active: AtomicUsize,
        peak: AtomicUsize,
        fail_fold: Option<usize>,
    }

    impl<E> InFlight<E> {
        fn new(inner: E) -> Self {
            Self {
                inner,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail_fold: None,
            }
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl<E: Evaluable<Model = TrainedSvm>> Evaluable for InFlight<E> {
        type Model = TrainedSvm;

        fn labels(&self) -> &[Label] {
            self.inner.labels()
        }

        fn evaluate(&self, fold: usize, split: &FoldSplit) -> Result<OuterFoldResult> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let result = if self.fail_fold == Some(fold) {
                Err(CVError::training("forced failure").with_context(format!("outer fold {fold}")))
            } else {
                self.inner.evaluate(fold, split)
            };
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn apply_best_parameters(
            &self,
            results: &[OuterFoldResult],
        ) -> Result<(TrainedSvm, BestParameters)> {
            self.inner.apply_best_parameters(results)
        }
    }

    fn algorithm() -> NestedLinearSvm<FeatureSpace> {
        let mut rows = Vec::new();
        let mut labels: Vec<Label> = Vec::new();
        for i in 0..20 {
            let t = i as f64 / 20.0;
            rows.push(vec![1.0 + t, 0.4 * t]);
            labels.push(1);
            rows.push(vec![-1.0 - t, -0.4 * t]);
            labels.push(0);
        }
        let space = FeatureSpace::new(Matrix::from_rows(rows).expect("rows")).expect("features");
        NestedLinearSvm::new(space, labels)
            .expect("inputs")
            .with_search(
                GridSearch::new(CGrid::new(vec![0.1, 1.0]).expect("grid"), 3)
                    .with_inner_threads(2),
            )
            .with_seed(5)
    }

    #[test]
    fn test_single_outer_worker_runs_one_fold_at_a_time() {
        let mut validation = KFoldValidation::new(InFlight::new(algorithm()), 8)
            .with_outer_threads(1)
            .with_seed(1);
        let outcome = validation.validate(None).expect("validate");

        assert_eq!(outcome.results.len(), 8);
        assert_eq!(validation.algorithm().peak(), 1);
    }

    #[test]
    fn test_holdout_respects_outer_worker_count() {
        let mut validation = RepeatedHoldout::new(InFlight::new(algorithm()), 12, 0.2)
            .with_outer_threads(2)
            .with_seed(1);
        let outcome = validation.validate(None).expect("validate");

        assert_eq!(outcome.results.len(), 12);
        assert!(validation.algorithm().peak() <= 2);
        for (i, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.fold, i);
        }
    }

    #[test]
    fn test_failing_fold_aborts_the_run() {
        let mut flaky = InFlight::new(algorithm());
        flaky.fail_fold = Some(2);
        let splits = KFoldValidation::new(algorithm(), 4)
            .with_seed(3)
            .generate_splits()
            .expect("splits");

        let err = run_outer_splits(&flaky, &splits, 2).unwrap_err();
        assert!(err.to_string().contains("outer fold 2"));
    }

    #[test]
    fn test_zero_outer_threads_is_configuration_error() {
        let splits = KFoldValidation::new(algorithm(), 4)
            .generate_splits()
            .expect("splits");
        assert!(matches!(
            run_outer_splits(&algorithm(), &splits, 0),
            Err(CVError::Configuration(_))
        ));
    }
}
