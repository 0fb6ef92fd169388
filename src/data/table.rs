//! Delimited table loading (CSV / TSV)
//!
//! - The last column is the label
//! - All other columns are features
//! - First row can be headers (automatically detected)
//! - Lines starting with '#' are comments

use crate::core::{CVError, Matrix, Result};
use crate::data::{parse_label, Dataset};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Field delimiter implied by a file extension (tab for `.tsv`, else comma)
pub fn delimiter_for<P: AsRef<Path>>(path: P) -> u8 {
    match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

/// Read every record of a delimited source; the header is not interpreted
pub(crate) fn read_records<R: Read>(reader: R, delimiter: u8) -> Result<Vec<StringRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// Check if a record appears to be a header: some feature field is not numeric
fn is_header(record: &StringRecord) -> bool {
    if record.len() < 2 {
        return record.iter().any(|f| f.parse::<f64>().is_err());
    }
    record
        .iter()
        .take(record.len() - 1)
        .any(|field| field.parse::<f64>().is_err())
}

/// Parse records into a dataset (features then label per row)
fn records_to_dataset(records: &[StringRecord]) -> Result<Dataset> {
    let data = match records.first() {
        Some(first) if is_header(first) => {
            debug!("Skipping header row: {:?}", first);
            &records[1..]
        }
        _ => records,
    };
    if data.is_empty() {
        return Err(CVError::EmptyDataset);
    }

    let width = data[0].len();
    if width < 2 {
        return Err(CVError::Data(
            "table needs at least one feature column and a label column".to_string(),
        ));
    }

    let mut values = Vec::with_capacity(data.len() * (width - 1));
    let mut labels = Vec::with_capacity(data.len());
    for (row, record) in data.iter().enumerate() {
        if record.len() != width {
            return Err(CVError::ParseError(format!(
                "row {} has {} fields, expected {width}",
                row + 1,
                record.len()
            )));
        }
        for field in record.iter().take(width - 1) {
            values.push(field.parse::<f64>().map_err(|_| {
                CVError::ParseError(format!("Invalid feature value on row {}: {field}", row + 1))
            })?);
        }
        labels.push(parse_label(&record[width - 1])?);
    }

    Dataset::new(Matrix::new(data.len(), width - 1, values)?, labels)
}

/// Load a labelled feature table from a reader
pub fn load_table_from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Dataset> {
    records_to_dataset(&read_records(reader, delimiter)?)
}

/// Load a labelled feature table; the delimiter follows the extension
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    load_table_from_reader(file, delimiter_for(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::Builder;

    #[test]
    fn test_load_with_header() {
        let data = "f1,f2,label\n1.0,2.0,1\n-1.0,0.5,0\n";
        let dataset = load_table_from_reader(Cursor::new(data), b',').expect("table");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 2);
        assert_eq!(dataset.labels(), &[1, 0]);
        assert_eq!(dataset.features().row(1), &[-1.0, 0.5]);
    }

    #[test]
    fn test_load_without_header_and_with_comments() {
        let data = "# generated\n1.0\t2.0\t-1\n\n3.0\t4.0\t1\n";
        let dataset = load_table_from_reader(Cursor::new(data), b'\t').expect("table");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels(), &[0, 1]);
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(load_table_from_reader(Cursor::new("1.0,x,1\n"), b',').is_err());
        assert!(matches!(
            load_table_from_reader(Cursor::new("1.0,2.0,5\n"), b','),
            Err(CVError::InvalidLabel(_))
        ));
        assert!(matches!(
            load_table_from_reader(Cursor::new("a,b,label\n"), b','),
            Err(CVError::EmptyDataset)
        ));
    }

    #[test]
    fn test_load_tsv_file() {
        let mut file = Builder::new()
            .suffix(".tsv")
            .tempfile()
            .expect("Failed to create temp file");
        writeln!(file, "x\ty").expect("Failed to write");
        writeln!(file, "0.5\t1").expect("Failed to write");
        writeln!(file, "-0.5\t0").expect("Failed to write");
        file.flush().expect("Failed to flush");

        let dataset = Dataset::from_file(file.path()).expect("table");
        assert_eq!(dataset.labels(), &[1, 0]);
        assert_eq!(delimiter_for(file.path()), b'\t');
    }
}
