//! LibSVM format dataset implementation
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Rows are densified; missing indices are zero.

use crate::core::{CVError, Label, Matrix, Result};
use crate::data::{parse_label, Dataset};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One parsed line: label and 0-based (index, value) pairs
type SparseRow = (Label, Vec<(usize, f64)>);

/// Dataset loaded from a LibSVM format file
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    rows: Vec<SparseRow>,
    dimensions: usize,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();
        let mut dimensions = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let row = Self::parse_line(line).map_err(|e| match e {
                CVError::InvalidLabel(_) => e,
                other => CVError::ParseError(format!(
                    "Error parsing line {}: {}",
                    line_num + 1,
                    other
                )),
            })?;
            if let Some(&(max_idx, _)) = row.1.iter().max_by_key(|(i, _)| *i) {
                dimensions = dimensions.max(max_idx + 1);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(CVError::EmptyDataset);
        }

        Ok(LibSVMDataset { rows, dimensions })
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> Result<SparseRow> {
        let mut parts = line.split_whitespace();
        let label = parse_label(
            parts
                .next()
                .ok_or_else(|| CVError::ParseError("Empty line".to_string()))?,
        )?;

        let mut features = Vec::new();
        for feature_str in parts {
            let (index, value) = feature_str.split_once(':').ok_or_else(|| {
                CVError::ParseError(format!("Invalid feature format: {feature_str}"))
            })?;

            let index = index
                .parse::<usize>()
                .map_err(|_| CVError::ParseError(format!("Invalid feature index: {index}")))?;
            let value = value
                .parse::<f64>()
                .map_err(|_| CVError::ParseError(format!("Invalid feature value: {value}")))?;

            // libsvm uses 1-based indexing, convert to 0-based
            if index == 0 {
                return Err(CVError::ParseError(
                    "Feature index must be positive: 0".to_string(),
                ));
            }
            features.push((index - 1, value));
        }

        Ok((label, features))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Highest feature index seen (1-based), i.e. the dense width
    pub fn dim(&self) -> usize {
        self.dimensions
    }

    pub fn labels(&self) -> Vec<Label> {
        self.rows.iter().map(|(label, _)| *label).collect()
    }

    /// Dense N x D feature matrix
    pub fn to_matrix(&self) -> Matrix {
        let mut matrix = Matrix::zeros(self.rows.len(), self.dimensions);
        for (r, (_, features)) in self.rows.iter().enumerate() {
            for &(index, value) in features {
                matrix.set(r, index, value);
            }
        }
        matrix
    }

    pub fn into_dataset(self) -> Result<Dataset> {
        Dataset::new(self.to_matrix(), self.labels())
    }
}
