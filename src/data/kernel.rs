//! Precomputed kernel matrices and standalone label files

use crate::core::{CVError, Label, Matrix, Result};
use crate::data::table::{delimiter_for, read_records};
use crate::data::parse_label;
use crate::kernel::PrecomputedKernel;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read an N x N kernel matrix (no header, no labels)
pub fn load_kernel_from_reader<R: Read>(reader: R, delimiter: u8) -> Result<PrecomputedKernel> {
    let records = read_records(reader, delimiter)?;
    let rows = records
        .iter()
        .enumerate()
        .map(|(r, record)| {
            record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| {
                        CVError::ParseError(format!("Invalid kernel value on row {}: {field}", r + 1))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    PrecomputedKernel::new(Matrix::from_rows(rows)?)
}

/// Read a kernel matrix; the delimiter follows the extension
pub fn load_kernel<P: AsRef<Path>>(path: P) -> Result<PrecomputedKernel> {
    let path = path.as_ref();
    load_kernel_from_reader(File::open(path)?, delimiter_for(path))
}

/// Read one label per line (the last field of each record is used)
pub fn load_labels_from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Label>> {
    let records = read_records(reader, delimiter)?;
    let labels = records
        .iter()
        .filter_map(|record| record.iter().last())
        .map(parse_label)
        .collect::<Result<Vec<_>>>()?;
    if labels.is_empty() {
        return Err(CVError::EmptyDataset);
    }
    Ok(labels)
}

pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<Label>> {
    let path = path.as_ref();
    load_labels_from_reader(File::open(path)?, delimiter_for(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SampleSet;
    use std::io::Cursor;

    #[test]
    fn test_load_kernel() {
        let data = "4\t1\t2\n1\t5\t3\n2\t3\t6\n";
        let kernel = load_kernel_from_reader(Cursor::new(data), b'\t').expect("kernel");
        assert_eq!(kernel.len(), 3);
        assert_eq!(kernel.matrix().get(2, 1), 3.0);
    }

    #[test]
    fn test_non_square_kernel_is_rejected() {
        let data = "1,2,3\n4,5,6\n";
        assert!(matches!(
            load_kernel_from_reader(Cursor::new(data), b','),
            Err(CVError::Data(_))
        ));
    }

    #[test]
    fn test_load_labels() {
        let labels = load_labels_from_reader(Cursor::new("1\n-1\n0\n+1\n"), b',').expect("labels");
        assert_eq!(labels, vec![1, 0, 0, 1]);
        assert!(load_labels_from_reader(Cursor::new("# nothing\n"), b',').is_err());
    }
}
