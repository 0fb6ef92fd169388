//! Stratified split generation
//!
//! Both generators keep class proportions in every partition and are fully
//! determined by the random generator passed in.

use crate::core::{CVError, FoldSplit, Label, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Positions grouped by class, in ascending order
fn members_by_class(labels: &[Label]) -> Vec<Vec<usize>> {
    let mut classes: Vec<Label> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    classes
        .iter()
        .map(|&class| {
            labels
                .iter()
                .enumerate()
                .filter(|(_, l)| **l == class)
                .map(|(i, _)| i)
                .collect()
        })
        .collect()
}

/// Sorted complement of `test` within `0..n`
fn complement(n: usize, test: &[usize]) -> Vec<usize> {
    let mut held_out = vec![false; n];
    for &i in test {
        held_out[i] = true;
    }
    (0..n).filter(|&i| !held_out[i]).collect()
}

/// Split positions `0..labels.len()` into `k` stratified folds
///
/// Members of each class are shuffled and dealt so that fold sizes per
/// class differ by at most one. Every position is tested exactly once.
pub fn stratified_kfold<R: Rng + ?Sized>(
    labels: &[Label],
    k: usize,
    rng: &mut R,
) -> Result<Vec<FoldSplit>> {
    let n = labels.len();
    if k < 2 {
        return Err(CVError::Configuration(format!(
            "k-fold requires at least 2 folds, got {k}"
        )));
    }
    if k > n {
        return Err(CVError::Configuration(format!(
            "cannot split {n} samples into {k} folds"
        )));
    }

    let mut tests: Vec<Vec<usize>> = vec![Vec::new(); k];
    for mut members in members_by_class(labels) {
        members.shuffle(rng);
        let count = members.len();
        let mut start = 0;
        for (fold, test) in tests.iter_mut().enumerate() {
            let size = (fold + 1) * count / k - fold * count / k;
            test.extend_from_slice(&members[start..start + size]);
            start += size;
        }
    }

    tests
        .into_iter()
        .enumerate()
        .map(|(fold, mut test)| {
            if test.is_empty() {
                return Err(CVError::Configuration(format!(
                    "fold {fold} of {k} has no test samples"
                )));
            }
            test.sort_unstable();
            let train = complement(n, &test);
            Ok(FoldSplit::new(train, test))
        })
        .collect()
}

/// `n_iterations` independent stratified train/test splits
///
/// Each test set holds `ceil(test_size * n)` positions, allocated to the
/// classes by largest remainder.
pub fn stratified_shuffle_split<R: Rng + ?Sized>(
    labels: &[Label],
    n_iterations: usize,
    test_size: f64,
    rng: &mut R,
) -> Result<Vec<FoldSplit>> {
    let n = labels.len();
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(CVError::Configuration(format!(
            "test_size must lie strictly between 0 and 1, got {test_size}"
        )));
    }
    if n_iterations == 0 {
        return Err(CVError::Configuration(
            "at least one holdout iteration is required".to_string(),
        ));
    }

    let classes = members_by_class(labels);
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n - n_test.min(n);
    if n_test < classes.len() || n_train < classes.len() {
        return Err(CVError::Configuration(format!(
            "{n} samples with test_size {test_size} give {n_test} test and {n_train} training \
             samples, each must be at least the number of classes ({})",
            classes.len()
        )));
    }

    let test_counts = allocate(&classes, n, n_test);

    let mut splits = Vec::with_capacity(n_iterations);
    for _ in 0..n_iterations {
        let mut test = Vec::with_capacity(n_test);
        for (members, &count) in classes.iter().zip(&test_counts) {
            let mut shuffled = members.clone();
            shuffled.shuffle(rng);
            test.extend_from_slice(&shuffled[..count]);
        }
        test.sort_unstable();
        let train = complement(n, &test);
        splits.push(FoldSplit::new(train, test));
    }

    Ok(splits)
}

/// Per-class test counts summing to `n_test`: floors first, then the
/// remaining slots go to the largest fractional parts
fn allocate(classes: &[Vec<usize>], n: usize, n_test: usize) -> Vec<usize> {
    let exact: Vec<f64> = classes
        .iter()
        .map(|m| m.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut order: Vec<usize> = (0..classes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
    });

    let mut remaining = n_test - counts.iter().sum::<usize>();
    for &class in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        if counts[class] < classes[class].len() {
            counts[class] += 1;
            remaining -= 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn labels(n_pos: usize, n_neg: usize) -> Vec<Label> {
        let mut labels = vec![1; n_pos];
        labels.extend(vec![0; n_neg]);
        labels
    }

    #[test]
    fn test_kfold_covers_every_sample_once() {
        let y = labels(7, 13);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let folds = stratified_kfold(&y, 4, &mut rng).expect("valid folds");

        assert_eq!(folds.len(), 4);
        let mut seen = vec![0; y.len()];
        for split in &folds {
            assert!(split.validate(y.len()).is_ok());
            assert_eq!(split.train.len() + split.test.len(), y.len());
            for &i in &split.test {
                seen[i] += 1;
            }
            // 7 positives over 4 folds: 1 or 2 per fold
            let pos = split.test.iter().filter(|&&i| y[i] == 1).count();
            assert!(pos == 1 || pos == 2);
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_kfold_is_deterministic_for_a_seed() {
        let y = labels(10, 10);
        let a = stratified_kfold(&y, 5, &mut ChaCha8Rng::seed_from_u64(9)).expect("folds");
        let b = stratified_kfold(&y, 5, &mut ChaCha8Rng::seed_from_u64(9)).expect("folds");
        assert_eq!(a, b);
    }

    #[test]
    fn test_kfold_rejects_bad_k() {
        let y = labels(2, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(stratified_kfold(&y, 1, &mut rng).is_err());
        assert!(stratified_kfold(&y, 5, &mut rng).is_err());
    }

    #[test]
    fn test_shuffle_split_sizes_and_strata() {
        let y = labels(8, 12);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let splits = stratified_shuffle_split(&y, 6, 0.25, &mut rng).expect("valid splits");

        assert_eq!(splits.len(), 6);
        for split in &splits {
            assert!(split.validate(y.len()).is_ok());
            assert_eq!(split.test.len(), 5);
            assert_eq!(split.train.len(), 15);
            let pos = split.test.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(pos, 2);
        }
    }

    #[test]
    fn test_shuffle_split_largest_remainder() {
        // 3 and 7 members, 2 test slots: exact 0.6 and 1.4 -> 1 and 1
        let y = labels(3, 7);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let splits = stratified_shuffle_split(&y, 1, 0.2, &mut rng).expect("valid split");
        let pos = splits[0].test.iter().filter(|&&i| y[i] == 1).count();
        assert_eq!(splits[0].test.len(), 2);
        assert_eq!(pos, 1);
    }

    #[test]
    fn test_shuffle_split_rejects_bad_sizes() {
        let y = labels(3, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(stratified_shuffle_split(&y, 1, 0.0, &mut rng).is_err());
        assert!(stratified_shuffle_split(&y, 1, 1.0, &mut rng).is_err());
        // ceil(0.05 * 6) = 1 test sample < 2 classes
        assert!(stratified_shuffle_split(&y, 1, 0.05, &mut rng).is_err());
        assert!(stratified_shuffle_split(&y, 0, 0.5, &mut rng).is_err());
    }
}
