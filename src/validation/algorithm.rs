//! Nested linear SVM: the outer evaluation step and final-model aggregation

use crate::classifier::{SvmClassifier, TrainedSvm};
use crate::core::{
    validate_labels, BestParameters, CVError, ClassWeight, Evaluable, FoldSplit, Label,
    OuterFoldResult, Result, SampleSet,
};
use crate::metrics::ClassificationMetrics;
use crate::search::{geometric_mean, GridSearch};
use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Linear SVM whose C is chosen by an inner grid search on each outer split
///
/// Generic over the sample set, so the same algorithm runs on a
/// precomputed kernel or on raw features.
#[derive(Debug, Clone)]
pub struct NestedLinearSvm<S: SampleSet> {
    samples: S,
    labels: Vec<Label>,
    search: GridSearch,
    classifier: SvmClassifier,
    seed: u64,
}

impl<S: SampleSet> NestedLinearSvm<S> {
    pub fn new(samples: S, labels: Vec<Label>) -> Result<Self> {
        if samples.is_empty() {
            return Err(CVError::EmptyDataset);
        }
        if samples.len() != labels.len() {
            return Err(CVError::DimensionMismatch {
                expected: samples.len(),
                actual: labels.len(),
            });
        }
        validate_labels(&labels)?;

        Ok(Self {
            samples,
            labels,
            search: GridSearch::default(),
            classifier: SvmClassifier::default(),
            seed: 0,
        })
    }

    /// Inner search settings (grid, inner folds, inner threads)
    pub fn with_search(mut self, search: GridSearch) -> Self {
        self.search = search.with_classifier(self.classifier.clone());
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.classifier = self.classifier.with_class_weight(class_weight);
        self.search = self.search.with_classifier(self.classifier.clone());
        self
    }

    /// Base seed; outer fold `i` draws its inner splits from `seed + i`
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.classifier = self.classifier.with_seed(seed);
        self.search = self.search.with_classifier(self.classifier.clone());
        self
    }

    pub fn samples(&self) -> &S {
        &self.samples
    }

    pub fn search(&self) -> &GridSearch {
        &self.search
    }

    fn gather(&self, index: &[usize]) -> Vec<Label> {
        index.iter().map(|&i| self.labels[i]).collect()
    }
}

impl<S: SampleSet> Evaluable for NestedLinearSvm<S> {
    type Model = TrainedSvm;

    fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn evaluate(&self, fold: usize, split: &FoldSplit) -> Result<OuterFoldResult> {
        let context = format!("outer fold {fold}");
        split
            .validate(self.labels.len())
            .map_err(|e| e.with_context(&context))?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(fold as u64));
        let best_parameter = self
            .search
            .search(&self.samples, &self.labels, &split.train, &mut rng)
            .map_err(|e| e.with_context(&context))?;

        let y_train = self.gather(&split.train);
        let y = self.gather(&split.test);
        let fit = self
            .classifier
            .train_and_score(
                &self.samples.kernel_slice(&split.train, &split.train),
                &self.samples.kernel_slice(&split.test, &split.train),
                &y_train,
                &y,
                best_parameter.c,
            )
            .map_err(|e| e.with_context(&context))?;

        let evaluation = ClassificationMetrics::evaluate(&y, &fit.y_hat);
        let evaluation_train = ClassificationMetrics::evaluate(&y_train, &fit.y_hat_train);
        debug!(
            "Outer fold {fold}: C={:.3e}, balanced accuracy {:.4}, AUC {:.4}",
            best_parameter.c, evaluation.balanced_accuracy, fit.auc
        );

        Ok(OuterFoldResult {
            fold,
            best_parameter,
            evaluation,
            evaluation_train,
            y_hat: fit.y_hat,
            y_hat_train: fit.y_hat_train,
            y,
            y_train,
            auc: fit.auc,
            train_index: split.train.clone(),
            test_index: split.test.clone(),
        })
    }

    fn apply_best_parameters(
        &self,
        results: &[OuterFoldResult],
    ) -> Result<(TrainedSvm, BestParameters)> {
        if results.is_empty() {
            return Err(CVError::Configuration(
                "no outer fold results to aggregate".to_string(),
            ));
        }

        let cs: Vec<f64> = results.iter().map(|r| r.best_parameter.c).collect();
        let balanced_accuracy = results
            .iter()
            .map(|r| r.best_parameter.balanced_accuracy)
            .sum::<f64>()
            / results.len() as f64;
        let best = BestParameters {
            c: geometric_mean(&cs),
            balanced_accuracy,
        };

        let all: Vec<usize> = (0..self.labels.len()).collect();
        let model = self
            .classifier
            .clone()
            .with_c(best.c)
            .fit(&self.samples.kernel_slice(&all, &all), &self.labels)
            .map_err(|e| e.with_context("final model"))?;

        info!(
            "Final model: C={:.3e} (mean inner balanced accuracy {:.4}), {} support vectors",
            best.c,
            best.balanced_accuracy,
            model.n_support_vectors()
        );
        Ok((model, best))
    }
}
