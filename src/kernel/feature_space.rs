//! Sample set backed by raw feature vectors

use crate::core::{CVError, Matrix, Result, SampleSet};
use crate::kernel::{Kernel, LinearKernel, PrecomputedKernel};

/// N x D feature matrix; kernel slices are evaluated on demand
#[derive(Debug, Clone)]
pub struct FeatureSpace<K: Kernel = LinearKernel> {
    features: Matrix,
    kernel: K,
}

impl FeatureSpace<LinearKernel> {
    /// Feature space with the linear kernel
    pub fn new(features: Matrix) -> Result<Self> {
        Self::with_kernel(features, LinearKernel::new())
    }
}

impl<K: Kernel> FeatureSpace<K> {
    pub fn with_kernel(features: Matrix, kernel: K) -> Result<Self> {
        if features.rows() == 0 {
            return Err(CVError::EmptyDataset);
        }
        if features.cols() == 0 {
            return Err(CVError::Data("feature matrix has no columns".to_string()));
        }
        Ok(Self { features, kernel })
    }

    /// Number of features (D)
    pub fn dim(&self) -> usize {
        self.features.cols()
    }

    /// Materialize the full N x N Gram matrix
    pub fn precompute(&self) -> Result<PrecomputedKernel> {
        let n = self.features.rows();
        let mut gram = Matrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let value = self
                    .kernel
                    .compute(self.features.row(i), self.features.row(j));
                gram.set(i, j, value);
                gram.set(j, i, value);
            }
        }
        PrecomputedKernel::new(gram)
    }
}

impl<K: Kernel> SampleSet for FeatureSpace<K> {
    fn len(&self) -> usize {
        self.features.rows()
    }

    fn kernel_slice(&self, rows: &[usize], cols: &[usize]) -> Matrix {
        let mut slice = Matrix::zeros(rows.len(), cols.len());
        for (r, &i) in rows.iter().enumerate() {
            let x = self.features.row(i);
            for (c, &j) in cols.iter().enumerate() {
                slice.set(r, c, self.kernel.compute(x, self.features.row(j)));
            }
        }
        slice
    }

    fn features(&self) -> Option<&Matrix> {
        Some(&self.features)
    }
}
