//! Batch summaries for people and for tools

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{BatchResult, Operation};

pub mod formatter;
pub mod generator;

pub use formatter::ReportFormatter;
pub use generator::ReportGenerator;

/// Report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    PlainText,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(ReportFormat::PlainText),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

/// One line of the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    pub outcome: String,
    pub reason: Option<String>,
}

/// Serializable snapshot of a `BatchResult`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub operation: Operation,
    pub total_inputs: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub files: Vec<ReportEntry>,
}

impl BatchReport {
    pub fn from_result(result: &BatchResult) -> Self {
        let files = result
            .records()
            .iter()
            .map(|record| ReportEntry {
                input: record.input.clone(),
                output: record.output.clone(),
                backup: record.backup.clone(),
                outcome: record.outcome.label().to_string(),
                reason: record.outcome.failure_reason().map(|r| r.to_string()),
            })
            .collect();

        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            operation: result.operation(),
            total_inputs: result.total_inputs(),
            processed: result.records().len(),
            successful: result.successful(),
            failed: result.failed(),
            cancelled: result.is_cancelled(),
            files,
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ReportError> for crate::error::Error {
    fn from(err: ReportError) -> Self {
        crate::error::Error::ReportError(err.to_string())
    }
}
