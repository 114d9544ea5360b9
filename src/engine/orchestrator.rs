//! Batch orchestration
//!
//! Each input moves through validation, backup, transform preparation,
//! conflict resolution and the write. A failure at any step is recorded
//! against that file and the batch moves on. Files may run concurrently on
//! the blocking pool, but results and progress always come back in input
//! order. An output path is written at most once per run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::codec::DocumentCodec;
use crate::engine::backup::BackupManager;
use crate::engine::confirm::{Confirmation, ConfirmationSource};
use crate::engine::conflict::{ConflictResolver, Resolution};
use crate::engine::progress::{CancellationFlag, ProgressCallback, ProgressEvent};
use crate::engine::transform::TransformInvoker;
use crate::engine::validator::PathValidator;
use crate::error::ConflictError;
use crate::types::{BackupFailureAction, BatchResult, FailureReason, FileOutcome, FileRecord, Job};

pub struct BatchOrchestrator<C: DocumentCodec> {
    invoker: TransformInvoker<C>,
    validator: PathValidator,
    backups: BackupManager,
    conflicts: ConflictResolver,
    confirmation: Arc<dyn ConfirmationSource>,
    progress: Option<ProgressCallback>,
    cancellation: CancellationFlag,
    concurrency: usize,
}

impl<C: DocumentCodec> BatchOrchestrator<C> {
    pub fn new(codec: Arc<C>, confirmation: Arc<dyn ConfirmationSource>) -> Self {
        Self {
            invoker: TransformInvoker::new(codec),
            validator: PathValidator::new(),
            backups: BackupManager::new(),
            conflicts: ConflictResolver::new(),
            confirmation,
            progress: None,
            cancellation: CancellationFlag::new(),
            concurrency: 1,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Maximum number of files in flight. Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, max_concurrent_files: usize) -> Self {
        self.concurrency = max_concurrent_files.max(1);
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Runs every input of `job` and returns the ordered result. The job,
    /// and the passwords it holds, are dropped before this returns.
    #[instrument(skip(self, job), fields(operation = %job.operation(), files = job.inputs().len()))]
    pub async fn run(&self, job: Job) -> BatchResult {
        let job = Arc::new(job);
        let total = job.inputs().len();
        let mut result = BatchResult::new(job.operation(), total);
        let claimed = Arc::new(Mutex::new(HashSet::new()));
        info!(concurrency = self.concurrency, "batch started");

        let tasks = job.inputs().to_vec().into_iter().map(|input| {
            let worker = FileWorker {
                job: Arc::clone(&job),
                invoker: self.invoker.clone(),
                validator: self.validator.clone(),
                backups: self.backups.clone(),
                conflicts: self.conflicts.clone(),
                confirmation: Arc::clone(&self.confirmation),
                claimed: Arc::clone(&claimed),
            };
            let cancellation = self.cancellation.clone();

            async move {
                if cancellation.is_cancelled() {
                    return None;
                }
                let task_input = input.clone();
                let record = match tokio::task::spawn_blocking(move || worker.process(&task_input)).await {
                    Ok(record) => record,
                    Err(err) => {
                        error!(input = %input.display(), error = %err, "file task aborted");
                        FileRecord::failed(input, FailureReason::Internal(err.to_string()))
                    }
                };
                Some(record)
            }
        });

        let mut records = stream::iter(tasks).buffered(self.concurrency);
        while let Some(slot) = records.next().await {
            match slot {
                Some(record) => {
                    let current_file = record.input.clone();
                    result.push(record);
                    self.emit_progress(result.records().len(), total, current_file);
                }
                None => {
                    if !result.is_cancelled() {
                        warn!(processed = result.records().len(), "batch cancelled");
                    }
                    result.mark_cancelled();
                }
            }
        }
        drop(records);
        drop(job);

        info!(
            successful = result.successful(),
            failed = result.failed(),
            cancelled = result.is_cancelled(),
            "batch finished"
        );
        result
    }

    fn emit_progress(&self, index: usize, total: usize, current_file: PathBuf) {
        if let Some(callback) = &self.progress {
            match callback.lock() {
                Ok(mut report) => (*report)(ProgressEvent {
                    index,
                    total,
                    current_file,
                }),
                Err(_) => warn!("progress callback poisoned, event dropped"),
            }
        }
    }
}

/// Everything one file needs, moved onto the blocking pool
struct FileWorker<C: DocumentCodec> {
    job: Arc<Job>,
    invoker: TransformInvoker<C>,
    validator: PathValidator,
    backups: BackupManager,
    conflicts: ConflictResolver,
    confirmation: Arc<dyn ConfirmationSource>,
    /// Output paths already taken by this run
    claimed: Arc<Mutex<HashSet<PathBuf>>>,
}

impl<C: DocumentCodec> FileWorker<C> {
    fn process(&self, input: &Path) -> FileRecord {
        let job = self.job.as_ref();
        let mut record = FileRecord {
            input: input.to_path_buf(),
            output: None,
            backup: None,
            outcome: FileOutcome::Success,
        };

        if let Err(err) = self.validator.validate(input) {
            warn!(input = %input.display(), error = %err, "validation failed");
            record.outcome = FileOutcome::Failure(err.into());
            return record;
        }

        let policy = job.backup_policy();
        if policy.enabled {
            match self.backups.backup(input, policy) {
                Ok(path) => record.backup = Some(path),
                Err(err) => {
                    let proceed = match policy.on_failure {
                        BackupFailureAction::Abort => false,
                        BackupFailureAction::Proceed => true,
                        BackupFailureAction::Ask => {
                            self.confirmation.confirm(&Confirmation::ContinueWithoutBackup {
                                input: input.to_path_buf(),
                                error: err.to_string(),
                            })
                        }
                    };
                    if !proceed {
                        error!(input = %input.display(), error = %err, "backup failed");
                        record.outcome = FileOutcome::Failure(err.into());
                        return record;
                    }
                    warn!(input = %input.display(), error = %err, "continuing without backup");
                }
            }
        }

        let prepared = match self.invoker.prepare(job, input, self.confirmation.as_ref()) {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(input = %input.display(), error = %err, "transform failed");
                record.outcome = FileOutcome::Failure(err.into());
                return record;
            }
        };

        let output = job.output_for(input);
        if prepared.will_write() {
            if let Err(err) = self.claim_output(&output) {
                record.outcome = FileOutcome::Failure(err.into());
                return record;
            }
        }

        match self.invoker.write(job, prepared, &output) {
            Ok(transformed) => {
                if transformed.written {
                    record.output = Some(output);
                }
                info!(
                    input = %input.display(),
                    outcome = transformed.outcome.label(),
                    "file processed"
                );
                record.outcome = transformed.outcome;
            }
            Err(err) => {
                error!(input = %input.display(), error = %err, "transform failed");
                record.outcome = FileOutcome::Failure(err.into());
            }
        }
        debug!(input = %input.display(), "file recorded");
        record
    }

    /// Reserves `output` for this file. Fails if another file of the run
    /// holds it or if an existing file may not be overwritten.
    fn claim_output(&self, output: &Path) -> Result<(), ConflictError> {
        let fresh = self
            .claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(output.to_path_buf());
        if !fresh {
            warn!(output = %output.display(), "output already written by this batch");
            return Err(ConflictError::OutputExists(output.to_path_buf()));
        }

        match self
            .conflicts
            .resolve(output, self.job.overwrite_policy(), self.confirmation.as_ref())
        {
            Resolution::Proceed => Ok(()),
            Resolution::Skip => Err(ConflictError::OutputExists(output.to_path_buf())),
        }
    }
}
