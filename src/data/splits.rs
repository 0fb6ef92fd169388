//! Outer split files
//!
//! Splits are stored as a JSON array of `{"train": [...], "test": [...]}`
//! objects with 0-based sample positions.

use crate::core::{FoldSplit, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub fn load_splits<P: AsRef<Path>>(path: P) -> Result<Vec<FoldSplit>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn save_splits<P: AsRef<Path>>(splits: &[FoldSplit], path: P) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), splits)?;
    Ok(())
}
