//! Error types for the batch password engine
//!
//! Per-file errors (validation, backup, conflict, transform, codec) are caught
//! by the orchestrator and folded into a `FileOutcome`; only `Error` escapes
//! to callers, for run-level and setup failures.

use std::{
    io,
    path::PathBuf,
    result::Result as StdResult,
};

use thiserror::Error;

/// Custom result type for engine setup and presentation-layer operations
pub type Result<T> = StdResult<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job error: {0}")]
    JobError(#[from] JobError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Backup error: {0}")]
    BackupError(#[from] BackupError),

    #[error("Transform error: {0}")]
    TransformError(#[from] TransformError),

    #[error("Codec error: {0}")]
    CodecError(#[from] CodecError),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("Logging error: {0}")]
    LoggingError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

// -------------------- Sub-Error Categories --------------------

/// Rejections raised while building a `Job`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum JobError {
    #[error("no input files were given")]
    EmptyInputs,

    #[error("an explicit output path needs exactly one input, got {0}")]
    ExplicitOutputWithMultipleInputs(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a PDF file: {}", .0.display())]
    WrongExtension(PathBuf),

    #[error("cannot read file: {}", .0.display())]
    Unreadable(PathBuf),

    #[error("file does not start with a PDF header: {}", .0.display())]
    BadHeader(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackupError {
    #[error("could not back up {} to {}: {}", .source_path.display(), .backup_path.display(), .message)]
    Io {
        source_path: PathBuf,
        backup_path: PathBuf,
        message: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictError {
    #[error("output file exists and was not overwritten: {}", .0.display())]
    OutputExists(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransformError {
    #[error("incorrect password")]
    WrongPassword,

    #[error("document is already password protected")]
    AlreadyProtected,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    #[error("cannot parse document: {0}")]
    Parse(String),

    #[error("document is locked; verify a password first")]
    Locked,

    #[error("unsupported security handler: {0}")]
    UnsupportedSecurity(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("cannot serialize document: {0}")]
    Write(String),

    #[error("I/O failure: {0}")]
    Io(String),
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        CodecError::Io(err.to_string())
    }
}

impl From<lopdf::Error> for CodecError {
    fn from(err: lopdf::Error) -> Self {
        CodecError::Parse(err.to_string())
    }
}
