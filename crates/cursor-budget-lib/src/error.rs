//! Error types for parsing exports and persisting settings.

use thiserror::Error;

/// Failure to turn a delimited export into usage records.
///
/// Any variant aborts the whole parse; no partial collection is returned.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input has no data row after the header (or no header at all).
    #[error("CSV input must contain at least a header row and one data row")]
    EmptyOrHeaderOnly,

    /// A mandatory column is absent from the header row.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A data row could not be turned into a record.
    #[error("Error parsing line {line}: {cause}")]
    Row {
        /// 1-based line number in the input, the header being line 1.
        line: usize,
        cause: RowError,
    },

    /// The export file could not be read.
    #[error("Failed to read export: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Line number of the offending row, if the failure is row-specific.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Row { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Why a single data row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("Missing value for column: {0}")]
    MissingValue(String),

    #[error("Invalid date format: {0}")]
    InvalidDate(String),
}

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A setting value outside its allowed domain.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
}
