//! Sample set backed by a precomputed kernel matrix

use crate::core::{CVError, Matrix, Result, SampleSet};
use log::warn;

/// Symmetric N x N kernel matrix; slicing selects rows and columns
#[derive(Debug, Clone)]
pub struct PrecomputedKernel {
    kernel: Matrix,
}

impl PrecomputedKernel {
    /// Wrap a kernel matrix. It must be square and non-empty.
    pub fn new(kernel: Matrix) -> Result<Self> {
        if kernel.rows() == 0 {
            return Err(CVError::EmptyDataset);
        }
        if !kernel.is_square() {
            return Err(CVError::Data(format!(
                "kernel matrix must be square, got {}x{}",
                kernel.rows(),
                kernel.cols()
            )));
        }

        let asymmetry = kernel.max_asymmetry();
        if asymmetry > 1e-8 {
            warn!("Kernel matrix is not symmetric (max |K_ij - K_ji| = {asymmetry:e})");
        }

        Ok(Self { kernel })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.kernel
    }
}

impl SampleSet for PrecomputedKernel {
    fn len(&self) -> usize {
        self.kernel.rows()
    }

    fn kernel_slice(&self, rows: &[usize], cols: &[usize]) -> Matrix {
        self.kernel.select(rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_square() {
        let m = Matrix::zeros(2, 3);
        assert!(matches!(PrecomputedKernel::new(m), Err(CVError::Data(_))));
    }

    #[test]
    fn test_rejects_empty() {
        let m = Matrix::zeros(0, 0);
        assert!(matches!(
            PrecomputedKernel::new(m),
            Err(CVError::EmptyDataset)
        ));
    }

    #[test]
    fn test_slice_selects_rows_and_columns() {
        let m = Matrix::from_rows(vec![
            vec![4.0, 1.0, 2.0],
            vec![1.0, 5.0, 3.0],
            vec![2.0, 3.0, 6.0],
        ])
        .expect("3x3");
        let set = PrecomputedKernel::new(m).expect("square kernel");

        assert_eq!(set.len(), 3);
        let slice = set.kernel_slice(&[2], &[0, 1]);
        assert_eq!(slice.row(0), &[2.0, 3.0]);
        assert!(set.features().is_none());
    }
}
