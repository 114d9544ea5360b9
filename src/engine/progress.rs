//! Progress reporting and cooperative cancellation

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Emitted once per recorded file, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 1-based position of the file in the batch
    pub index: usize,
    pub total: usize,
    pub current_file: PathBuf,
}

impl ProgressEvent {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.index as f64 * 100.0 / self.total as f64
        }
    }
}

pub type ProgressCallback = Arc<Mutex<Box<dyn FnMut(ProgressEvent) + Send>>>;

pub fn progress_callback<F>(callback: F) -> ProgressCallback
where
    F: FnMut(ProgressEvent) + Send + 'static,
{
    Arc::new(Mutex::new(Box::new(callback)))
}

/// Forwards progress into a tokio channel. Events are dropped once the
/// receiver is gone.
pub fn channel_progress(sender: mpsc::UnboundedSender<ProgressEvent>) -> ProgressCallback {
    progress_callback(move |event| {
        let _ = sender.send(event);
    })
}

/// Shared stop request, checked before each file starts
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
