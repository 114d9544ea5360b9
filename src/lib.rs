//! Batch PDF password transformation
//!
//! Removes or applies password protection on many documents in one run,
//! with validation, timestamped backups, overwrite handling and a per-file
//! result for every input. Documents are handled through the
//! [`codec::DocumentCodec`] trait; [`codec::LopdfCodec`] is the shipped
//! implementation.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod types;
pub mod utils;

pub use codec::{CipherStrength, DocumentCodec, LopdfCodec};
pub use config::{EngineConfig, PermissionDefaults};
pub use engine::{
    BatchOrchestrator, CancellationFlag, Confirmation, ConfirmationSource, InteractiveConfirmation,
    PolicyConfirmation, ProgressCallback, ProgressEvent,
};
pub use error::{Error, Result};
pub use report::{BatchReport, ReportFormat, ReportGenerator};
pub use types::{
    BackupFailureAction, BackupPolicy, BatchResult, FailureReason, FileOutcome, FileRecord, Job,
    JobBuilder, Operation, OutputPolicy, OverwritePolicy, PasswordMaterial, PermissionSet, Secret,
};
