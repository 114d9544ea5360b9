//! Per-file outcomes and the batch summary

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, ConflictError, TransformError, ValidationError};
use crate::types::Operation;

/// Why a single file failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Validation(ValidationError),
    BackupFailed(BackupError),
    Conflict(ConflictError),
    Transform(TransformError),
    Internal(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Validation(e) => write!(f, "{}", e),
            FailureReason::BackupFailed(e) => write!(f, "{}", e),
            FailureReason::Conflict(e) => write!(f, "{}", e),
            FailureReason::Transform(e) => write!(f, "{}", e),
            FailureReason::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl From<ValidationError> for FailureReason {
    fn from(err: ValidationError) -> Self {
        FailureReason::Validation(err)
    }
}

impl From<BackupError> for FailureReason {
    fn from(err: BackupError) -> Self {
        FailureReason::BackupFailed(err)
    }
}

impl From<ConflictError> for FailureReason {
    fn from(err: ConflictError) -> Self {
        FailureReason::Conflict(err)
    }
}

impl From<TransformError> for FailureReason {
    fn from(err: TransformError) -> Self {
        FailureReason::Transform(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Success,
    /// The file was already in the requested state
    SuccessNoop,
    /// A protected input was opened and protected again with new credentials
    SuccessReencrypted,
    Failure(FailureReason),
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FileOutcome::Failure(_))
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            FileOutcome::Failure(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Success => "success",
            FileOutcome::SuccessNoop => "unchanged",
            FileOutcome::SuccessReencrypted => "re-encrypted",
            FileOutcome::Failure(_) => "failed",
        }
    }
}

/// Outcome of one input, with the artifacts it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    pub outcome: FileOutcome,
}

impl FileRecord {
    pub fn failed(input: PathBuf, reason: impl Into<FailureReason>) -> Self {
        Self {
            input,
            output: None,
            backup: None,
            outcome: FileOutcome::Failure(reason.into()),
        }
    }
}

/// Ordered result of a batch run
#[derive(Debug, Clone)]
pub struct BatchResult {
    operation: Operation,
    records: Vec<FileRecord>,
    total_inputs: usize,
    cancelled: bool,
}

impl BatchResult {
    pub(crate) fn new(operation: Operation, total_inputs: usize) -> Self {
        Self {
            operation,
            records: Vec::with_capacity(total_inputs),
            total_inputs,
            cancelled: false,
        }
    }

    pub(crate) fn push(&mut self, record: FileRecord) {
        self.records.push(record);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &FileOutcome> {
        self.records.iter().map(|r| &r.outcome)
    }

    pub fn total_inputs(&self) -> usize {
        self.total_inputs
    }

    pub fn successful(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.successful()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True when every input was processed and none failed
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.records.len() == self.total_inputs && self.failed() == 0
    }

    /// Inputs worth retrying
    pub fn failed_inputs(&self) -> Vec<&Path> {
        self.records
            .iter()
            .filter(|r| !r.outcome.is_success())
            .map(|r| r.input.as_path())
            .collect()
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }
}
