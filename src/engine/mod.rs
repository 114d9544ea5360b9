//! Batch password transformation engine
//!
//! Validator, backup manager, conflict resolver and transform invoker are
//! leaf components; `BatchOrchestrator` drives them per file and owns the
//! only cross-file state.

pub mod backup;
pub mod confirm;
pub mod conflict;
pub mod orchestrator;
pub mod progress;
pub mod transform;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use backup::BackupManager;
pub use confirm::{Confirmation, ConfirmationSource, InteractiveConfirmation, PolicyConfirmation};
pub use conflict::{ConflictResolver, Resolution};
pub use orchestrator::BatchOrchestrator;
pub use progress::{channel_progress, progress_callback, CancellationFlag, ProgressCallback, ProgressEvent};
pub use transform::{Prepared, Protection, TransformInvoker, Transformed};
pub use validator::PathValidator;
