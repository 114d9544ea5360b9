//! Text and JSON rendering of batch reports

use super::{BatchReport, ReportError, ReportFormat};

pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format(report: &BatchReport, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::PlainText => Ok(Self::to_text(report)),
            ReportFormat::Json => Self::to_json(report),
        }
    }

    fn to_text(report: &BatchReport) -> String {
        let mut output = String::new();
        output.push_str("=== Batch Processing Complete ===\n");
        output.push_str(&format!("Operation: {}\n", report.operation));
        output.push_str(&format!("Successful: {}\n", report.successful));
        output.push_str(&format!("Failed: {}\n", report.failed));
        if report.cancelled {
            output.push_str(&format!(
                "Cancelled after {} of {} files\n",
                report.processed, report.total_inputs
            ));
        }

        let failures: Vec<_> = report.files.iter().filter(|f| f.reason.is_some()).collect();
        if !failures.is_empty() {
            output.push_str("\nFailed files:\n");
            for entry in failures {
                output.push_str(&format!(
                    "  - {}: {}\n",
                    entry.input.display(),
                    entry.reason.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        let backups: Vec<_> = report
            .files
            .iter()
            .filter_map(|f| f.backup.as_ref().map(|b| (&f.input, b)))
            .collect();
        if !backups.is_empty() {
            output.push_str("\nBackups:\n");
            for (input, backup) in backups {
                output.push_str(&format!("  - {} -> {}\n", input.display(), backup.display()));
            }
        }

        output
    }

    fn to_json(report: &BatchReport) -> Result<String, ReportError> {
        serde_json::to_string_pretty(report)
            .map_err(|e| ReportError::SerializationError(e.to_string()))
    }
}
