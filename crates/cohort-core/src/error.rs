use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while building cohort segments.
#[derive(Error, Debug)]
pub enum CohortError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV layer could not decode a record.
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A customer row was present but could not be turned into a customer.
    #[error("Malformed customer row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A timezone string is neither a UTC offset nor an IANA name.
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A report could not be serialized.
    #[error("Failed to serialize JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the cohort crates.
pub type Result<T> = std::result::Result<T, CohortError>;
