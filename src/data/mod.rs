//! Data loading
//!
//! Feature datasets come from LibSVM files or delimited tables; precomputed
//! kernels, label vectors and outer splits have their own loaders.

pub mod kernel;
pub mod libsvm;
pub mod splits;
pub mod table;

pub use self::kernel::*;
pub use self::libsvm::*;
pub use self::splits::*;
pub use self::table::*;

use crate::core::{validate_labels, CVError, Label, Matrix, Result};
use std::path::Path;

/// Parse a class label; accepts 0/1 and the LibSVM convention -1/+1
pub fn parse_label(field: &str) -> Result<Label> {
    let value = field
        .trim()
        .parse::<f64>()
        .map_err(|_| CVError::ParseError(format!("Invalid label: {field}")))?;

    if value == 1.0 {
        Ok(1)
    } else if value == 0.0 || value == -1.0 {
        Ok(0)
    } else {
        Err(CVError::InvalidLabel(value))
    }
}

/// Dense feature matrix with one 0/1 label per row
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Matrix,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new(features: Matrix, labels: Vec<Label>) -> Result<Self> {
        if labels.is_empty() {
            return Err(CVError::EmptyDataset);
        }
        if features.rows() != labels.len() {
            return Err(CVError::DimensionMismatch {
                expected: labels.len(),
                actual: features.rows(),
            });
        }
        validate_labels(&labels)?;
        Ok(Self { features, labels })
    }

    /// Load by extension: `.csv` and `.tsv` are tables, anything else is LibSVM
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") | Some("tsv") => load_table(path),
            _ => LibSVMDataset::from_file(path).and_then(LibSVMDataset::into_dataset),
        }
    }

    pub fn features(&self) -> &Matrix {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of features
    pub fn dim(&self) -> usize {
        self.features.cols()
    }

    pub fn into_parts(self) -> (Matrix, Vec<Label>) {
        (self.features, self.labels)
    }
}
