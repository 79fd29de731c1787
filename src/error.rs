//! Abort-class error types for the verification engine.
//!
//! Only two failure classes surface as `Result::Err`: unusable input
//! (files, JSON, vocabularies) and internal execution faults. Compliance
//! violations and data errors are accumulated as [`crate::ErrorEntry`]
//! values inside the verification report and never abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort engine setup or an individual verification run.
#[derive(Debug, Error)]
pub enum VerifyError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse / setup errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid vocabulary document: {message}")]
    InvalidVocabulary { message: String },

    #[error("vocabulary initialization failed: {message}")]
    OracleInit { message: String },

    // Internal faults; the engine boundary converts these into a
    // single-entry ExecutionError 999 report
    #[error("data path step '{token}' cannot be resolved")]
    DataPath { token: String },

    #[error("path '{path}' cannot be resolved in the Domain Specification")]
    ShapePath { path: String },

    #[error("execution error: {message}")]
    Internal { message: String },
}

impl VerifyError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            Self::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
