//! Report generator

use std::path::Path;

use tokio::fs as async_fs;
use tracing::info;

use super::{BatchReport, ReportError, ReportFormat, ReportFormatter};
use crate::types::BatchResult;
use crate::utils::io::ensure_parent_dir;

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn render(result: &BatchResult, format: ReportFormat) -> Result<String, ReportError> {
        ReportFormatter::format(&BatchReport::from_result(result), format)
    }

    pub async fn write(result: &BatchResult, format: ReportFormat, path: &Path) -> Result<(), ReportError> {
        let content = Self::render(result, format)?;
        ensure_parent_dir(path)?;
        async_fs::write(path, content).await?;
        info!(path = %path.display(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::types::{FileOutcome, FileRecord, Operation};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_json_report_to_nested_path() {
        let mut result = BatchResult::new(Operation::AddPassword, 2);
        result.push(FileRecord {
            input: PathBuf::from("a.pdf"),
            output: Some(PathBuf::from("protected_a.pdf")),
            backup: None,
            outcome: FileOutcome::SuccessReencrypted,
        });
        result.push(FileRecord::failed(PathBuf::from("b.pdf"), TransformError::WrongPassword));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("run.json");
        ReportGenerator::write(&result, ReportFormat::Json, &path).await.unwrap();

        let report: BatchReport = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report.successful, 1);
        assert_eq!(report.files[0].outcome, "re-encrypted");
        assert_eq!(report.files[1].reason.as_deref(), Some("incorrect password"));
    }
}
