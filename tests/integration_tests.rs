//! Integration tests for the nestsvm library
//!
//! These tests run both outer strategies end to end and check the
//! properties a nested estimate depends on.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nestsvm::api::{run_kfold, run_repeated_holdout, NestedConfig};
use nestsvm::core::{CGrid, CVError, ErrorKind, FoldSplit, Label, Matrix, SampleSet, Validatable};
use nestsvm::kernel::FeatureSpace;
use nestsvm::persistence::{load_parameters, save_classifier, ClassifierArtifact};
use nestsvm::search::{geometric_mean, GridSearch};
use nestsvm::validation::{NestedLinearSvm, RepeatedHoldout, SelectionMode};
use nestsvm::SvmClassifier;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tempfile::TempDir;

/// Two separable clouds: class 1 around x0 = +2, class 0 around x0 = -2
fn separable(n_per_class: usize) -> (Matrix, Vec<Label>) {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n_per_class {
        let t = i as f64 / n_per_class as f64;
        rows.push(vec![2.0 + t, t - 0.5, 0.3 * t]);
        labels.push(1);
        rows.push(vec![-2.0 - t, 0.5 - t, -0.3 * t]);
        labels.push(0);
    }
    (Matrix::from_rows(rows).expect("rows"), labels)
}

fn config(seed: u64) -> NestedConfig {
    NestedConfig::new()
        .with_c_grid(CGrid::new(vec![0.01, 0.1, 1.0, 10.0]).expect("grid"))
        .with_inner_folds(3)
        .with_threads(2)
        .with_seed(seed)
}

#[test]
fn test_kfold_on_separable_data() {
    let (features, labels) = separable(20);
    let space = FeatureSpace::new(features.clone()).expect("features");

    let outcome = run_kfold(space, labels.clone(), None, 4, &config(3)).expect("k-fold");

    assert_eq!(outcome.results.len(), 4);
    for result in &outcome.results {
        assert!(
            result.evaluation.balanced_accuracy >= 0.9,
            "fold {} balanced accuracy {}",
            result.fold,
            result.evaluation.balanced_accuracy
        );
        assert_eq!(result.y.len(), result.test_index.len());
        assert_eq!(result.y_hat.len(), result.test_index.len());
        assert_eq!(result.y_train.len(), result.train_index.len());
    }

    // Final C is the geometric mean of the per-fold selections
    let selected: Vec<f64> = outcome.results.iter().map(|r| r.best_parameter.c).collect();
    assert_relative_eq!(
        outcome.best_parameters.c,
        geometric_mean(&selected),
        max_relative = 1e-12
    );

    let gram = FeatureSpace::new(features).expect("features").precompute().expect("gram");
    let predictions = outcome.model.predict(gram.matrix()).expect("predict");
    assert_eq!(predictions, labels);
}

#[test]
fn test_inner_folds_never_touch_outer_test_samples() {
    let (features, labels) = separable(15);
    let space = FeatureSpace::new(features).expect("features");
    let search = GridSearch::new(CGrid::new(vec![1.0]).expect("grid"), 3);

    let outer_train: Vec<usize> = (0..30).filter(|i| i % 5 != 0).collect();
    let outer_test: HashSet<usize> = (0..30).filter(|i| i % 5 == 0).collect();

    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let inner = search
        .inner_splits(&outer_train, &labels, &mut rng)
        .expect("inner splits");

    assert_eq!(inner.len(), 3);
    let mut covered = HashSet::new();
    for split in &inner {
        let train: HashSet<usize> = split.train.iter().copied().collect();
        let test: HashSet<usize> = split.test.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert!(train.is_disjoint(&outer_test));
        assert!(test.is_disjoint(&outer_test));
        covered.extend(test);
    }
    assert_eq!(covered.len(), outer_train.len());
    assert_eq!(space.len(), 30);
}

#[test]
fn test_kernel_and_feature_inputs_agree() {
    let (features, labels) = separable(12);
    let space = FeatureSpace::new(features).expect("features");
    let gram = space.precompute().expect("gram");

    let from_features = run_kfold(space, labels.clone(), None, 3, &config(21)).expect("features");
    let from_kernel = run_kfold(gram, labels, None, 3, &config(21)).expect("kernel");

    assert_eq!(from_features.best_parameters, from_kernel.best_parameters);
    for (a, b) in from_features.results.iter().zip(&from_kernel.results) {
        assert_eq!(a.test_index, b.test_index);
        assert_eq!(a.y_hat, b.y_hat);
    }
}

#[test]
fn test_fixed_seed_reproduces_final_model() {
    let (features, labels) = separable(10);
    let space = FeatureSpace::new(features).expect("features");

    let first = run_repeated_holdout(space.clone(), labels.clone(), None, 3, 0.25, &config(99))
        .expect("first");
    let second =
        run_repeated_holdout(space, labels, None, 3, 0.25, &config(99)).expect("second");

    assert_eq!(first.model, second.model);
    assert_eq!(first.best_parameters, second.best_parameters);
}

#[test]
fn test_repeated_holdout_iterations() {
    let (features, labels) = separable(10);
    let space = FeatureSpace::new(features).expect("features");

    let outcome = run_repeated_holdout(space, labels, None, 4, 0.2, &config(5)).expect("holdout");

    assert_eq!(outcome.results.len(), 4);
    for result in &outcome.results {
        let train: HashSet<usize> = result.train_index.iter().copied().collect();
        let test: HashSet<usize> = result.test_index.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 20);
        assert_eq!(test.len(), 4);
        // Stratified: two of each class held out
        assert_eq!(result.y.iter().filter(|&&l| l == 1).count(), 2);
    }
}

#[test]
fn test_holdout_variance_needs_two_iterations() {
    let (features, labels) = separable(8);
    let space = FeatureSpace::new(features).expect("features");
    let algorithm = config(1).algorithm(space, labels, 1).expect("algorithm");

    let mut single = RepeatedHoldout::new(algorithm.clone(), 1, 0.25)
        .with_outer_threads(1)
        .with_seed(1);
    single.validate(None).expect("one iteration");
    let err = single.estimate_variance().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let mut several = RepeatedHoldout::new(algorithm, 3, 0.25)
        .with_outer_threads(2)
        .with_seed(1);
    several.validate(None).expect("three iterations");
    let variance = several.estimate_variance().expect("variance");
    let balanced = variance.balanced_accuracy;
    assert!(balanced.corrected_resampled_t >= balanced.resampled_t);
}

#[test]
fn test_non_nested_holdout_is_rejected() {
    let (features, labels) = separable(6);
    let space = FeatureSpace::new(features).expect("features");
    let algorithm = NestedLinearSvm::new(space, labels).expect("algorithm");

    let mut holdout =
        RepeatedHoldout::new(algorithm, 2, 0.25).with_selection(SelectionMode::NonNested);
    assert!(matches!(
        holdout.validate(None),
        Err(CVError::Configuration(_))
    ));
}

#[test]
fn test_supplied_splits_are_used_verbatim() {
    let (features, labels) = separable(9);
    let space = FeatureSpace::new(features).expect("features");
    let splits = vec![
        FoldSplit::new((6..18).collect(), (0..6).collect()),
        FoldSplit::new((0..6).chain(12..18).collect(), (6..12).collect()),
        FoldSplit::new((0..12).collect(), (12..18).collect()),
    ];

    let outcome = run_kfold(space, labels, Some(splits.clone()), 3, &config(2)).expect("k-fold");
    for (result, split) in outcome.results.iter().zip(&splits) {
        assert_eq!(result.train_index, split.train);
        assert_eq!(result.test_index, split.test);
    }
}

#[test]
fn test_out_of_range_split_is_data_error() {
    let (features, labels) = separable(5);
    let space = FeatureSpace::new(features).expect("features");
    let splits = vec![
        FoldSplit::new((0..8).collect(), vec![8, 9, 10]),
        FoldSplit::new((2..10).collect(), vec![0, 1]),
    ];

    let err = run_kfold(space, labels, Some(splits), 2, &config(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
}

#[test]
fn test_single_class_training_set_is_training_error() {
    let (features, _) = separable(4);
    let space = FeatureSpace::new(features).expect("features");
    let all = (0..8).collect::<Vec<_>>();
    let kernel = space.kernel_slice(&all, &all);

    let err = SvmClassifier::default()
        .train_and_score(&kernel, &kernel, &[1; 8], &[1; 8], 1.0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Training);
}

#[test]
fn test_classifier_artifacts_reload() {
    let (features, labels) = separable(10);
    let space = FeatureSpace::new(features.clone()).expect("features");
    let gram = space.precompute().expect("gram");
    let outcome = run_kfold(space, labels, None, 2, &config(4)).expect("k-fold");

    let dir = TempDir::new().expect("Failed to create temp dir");
    let weights = save_classifier(
        dir.path(),
        &outcome.model,
        &outcome.best_parameters,
        Some(&features),
    )
    .expect("save")
    .expect("weights for a feature matrix");
    assert_eq!(weights.len(), 3);
    // Class 1 lies on the positive side of the first feature
    assert!(weights[0] > 0.0);

    let artifact = ClassifierArtifact::load_from_file(dir.path().join("model.json")).expect("load");
    let reloaded = artifact.to_trained().expect("model");
    let original = outcome.model.decision_function(gram.matrix()).expect("original");
    let restored = reloaded.decision_function(gram.matrix()).expect("reloaded");
    for (a, b) in original.iter().zip(&restored) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }

    let parameters = load_parameters(dir.path().join("best_parameters.json")).expect("parameters");
    assert_relative_eq!(parameters.c, outcome.best_parameters.c, max_relative = 1e-12);
}
