//! Error types for nested cross-validation

use thiserror::Error;

/// Broad failure classes used to decide how a caller should react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid setup or API misuse; fixing the call is the only remedy
    Configuration,
    /// The solver could not fit a fold (e.g. a single-class training set)
    Training,
    /// Inputs are inconsistent (lengths, labels, split indices)
    Data,
    /// Filesystem or (de)serialization failure
    Io,
}

#[derive(Error, Debug)]
pub enum CVError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Training failed ({context}): {reason}")]
    Training { context: String, reason: String },

    #[error("Invalid data: {0}")]
    Data(String),

    #[error("Invalid label: expected 0 or 1, got {0}")]
    InvalidLabel(f64),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index {index} out of range for {len} samples")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No results to save. Method validate() must be run before save_results()")]
    NotValidated,

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl CVError {
    /// Create a training error without fold context yet
    pub fn training<S: Into<String>>(reason: S) -> Self {
        CVError::Training {
            context: String::from("fit"),
            reason: reason.into(),
        }
    }

    /// Attach (or prepend) fold/candidate context
    ///
    /// Training errors keep their variant. Configuration and data errors are
    /// rewritten with the context in front of the message (keeping their
    /// kind); I/O errors and `NotValidated` pass through unchanged.
    pub fn with_context<S: AsRef<str>>(self, ctx: S) -> Self {
        let ctx = ctx.as_ref();
        match self {
            CVError::Training { context, reason } => CVError::Training {
                context: format!("{ctx}, {context}"),
                reason,
            },
            CVError::Configuration(msg) => CVError::Configuration(format!("{ctx}: {msg}")),
            CVError::Data(msg) => CVError::Data(format!("{ctx}: {msg}")),
            CVError::ParseError(msg) => CVError::ParseError(format!("{ctx}: {msg}")),
            e @ (CVError::InvalidLabel(_)
            | CVError::DimensionMismatch { .. }
            | CVError::IndexOutOfRange { .. }
            | CVError::EmptyDataset) => CVError::Data(format!("{ctx}: {e}")),
            other => other,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CVError::Configuration(_) | CVError::NotValidated => ErrorKind::Configuration,
            CVError::Training { .. } => ErrorKind::Training,
            CVError::Data(_)
            | CVError::InvalidLabel(_)
            | CVError::DimensionMismatch { .. }
            | CVError::IndexOutOfRange { .. }
            | CVError::EmptyDataset
            | CVError::ParseError(_) => ErrorKind::Data,
            CVError::IoError(_) | CVError::CsvError(_) | CVError::SerializationError(_) => {
                ErrorKind::Io
            }
        }
    }
}

impl From<serde_json::Error> for CVError {
    fn from(e: serde_json::Error) -> Self {
        CVError::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CVError>;
