use std::path::PathBuf;
use thiserror::Error;

/// Problems that stop an import before any row is processed.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported source file type '{0}' (expected xlsx, xlsm, xlsb, xls, ods or csv)")]
    UnsupportedFormat(String),

    #[error("Failed to read spreadsheet {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("Sheet {index} not found; the workbook has {available} sheet(s)")]
    MissingSheet { index: usize, available: usize },

    #[error("The sheet has no header row")]
    MissingHeader,

    #[error("Failed to read CSV source: {0}")]
    Csv(#[from] csv::Error),
}
