//! Error taxonomy: per-item conversion failures, store boundary errors, and fatal run errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of one external conversion call. Captured per item, never fatal to a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// Malformed call: empty or equal paths, zero conformers.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Non-zero exit or no output artifact.
    #[error("process failed: {0}")]
    ProcessFailed(String),
    #[error("I/O error: {0}")]
    Io(String),
    /// Child was killed because the run was cancelled.
    #[error("cancelled while converting")]
    Cancelled,
}

impl From<std::io::Error> for ConversionError {
    fn from(e: std::io::Error) -> Self {
        ConversionError::Io(e.to_string())
    }
}

/// Failure at the item store or output sink boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Captured failure for one positioned item. Travels downstream as `Payload::Failure`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("could not read record: {0}")]
    Read(String),
    #[error("could not write temporary artifact: {0}")]
    Materialize(String),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("could not load converted record: {0}")]
    Load(String),
}

impl ItemError {
    /// Stable short name used in failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Read(_) => "read",
            ItemError::Materialize(_) => "materialize",
            ItemError::Conversion(ConversionError::InvalidArgument(_)) => "invalid_argument",
            ItemError::Conversion(ConversionError::Timeout(_)) => "timeout",
            ItemError::Conversion(ConversionError::ProcessFailed(_)) => "process_failed",
            ItemError::Conversion(ConversionError::Io(_)) => "io",
            ItemError::Conversion(ConversionError::Cancelled) => "cancelled",
            ItemError::Load(_) => "load",
        }
    }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raised before any stage starts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The source collection could not be enumerated at all.
    #[error("cannot read source collection: {0}")]
    Stream(#[source] StoreError),
    /// Appending to or finalizing the output collection failed.
    #[error("cannot write output collection: {0}")]
    Output(#[source] StoreError),
    #[error("cannot create scratch directory {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} thread panicked")]
    Thread(&'static str),
}
