//! Error types for RunDQ.

use thiserror::Error;

/// RunDQ error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A histogram spec referenced a column absent from the batch schema.
    #[error("missing column '{column}' (spec '{spec}')")]
    MissingColumn {
        /// Name of the spec that referenced the column.
        spec: String,
        /// The column that does not exist.
        column: String,
    },

    /// No interval or no luminosity files were found where required.
    #[error("missing run-quality data: {0}")]
    MissingIntervalData(String),

    /// Merge input with non-integer or misaligned run-number bin edges.
    #[error("invalid binning for '{histogram}' from {input}: {reason}")]
    InvalidBinning {
        /// Histogram name.
        histogram: String,
        /// Identity of the offending input set (file path or label).
        input: String,
        /// What was wrong with the edges.
        reason: String,
    },

    /// A declarative histogram spec failed validation.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// Selection-expression parse or evaluation error.
    #[error("expression error: {0}")]
    Expression(String),

    /// Column data with inconsistent event counts or element types.
    #[error("column shape error: {0}")]
    ColumnShape(String),

    /// Malformed or incomplete persisted artifact.
    #[error("artifact error: {0}")]
    Artifact(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
