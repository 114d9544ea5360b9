//! Timestamped snapshots of inputs taken before they are transformed

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use filetime::FileTime;
use tracing::{debug, info};

use crate::error::BackupError;
use crate::types::BackupPolicy;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Default, Clone)]
pub struct BackupManager;

impl BackupManager {
    pub fn new() -> Self {
        Self
    }

    /// Copies `path` to `<stem>_backup_<YYYYMMDD_HHMMSS>.<ext>` in the
    /// policy's directory, or next to the input when none is set.
    pub fn backup(&self, path: &Path, policy: &BackupPolicy) -> Result<PathBuf, BackupError> {
        self.backup_at(path, policy.directory.as_deref(), Local::now())
    }

    pub fn backup_at(
        &self,
        path: &Path,
        directory: Option<&Path>,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf, BackupError> {
        let backup_path = backup_path_for(path, directory, timestamp);
        let fail = |message: String| BackupError::Io {
            source_path: path.to_path_buf(),
            backup_path: backup_path.clone(),
            message,
        };

        if let Some(dir) = backup_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
                debug!(directory = %dir.display(), "created backup directory");
            }
        }

        let metadata = fs::metadata(path).map_err(|e| fail(e.to_string()))?;
        fs::copy(path, &backup_path).map_err(|e| fail(e.to_string()))?;

        let accessed = FileTime::from_last_access_time(&metadata);
        let modified = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(&backup_path, accessed, modified)
            .map_err(|e| fail(e.to_string()))?;

        info!(input = %path.display(), backup = %backup_path.display(), "backup created");
        Ok(backup_path)
    }
}

fn backup_path_for(path: &Path, directory: Option<&Path>, timestamp: DateTime<Local>) -> PathBuf {
    let mut name: OsString = path.file_stem().map(OsString::from).unwrap_or_else(|| "document".into());
    name.push(format!("_backup_{}", timestamp.format(TIMESTAMP_FORMAT)));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }

    let dir = directory
        .map(Path::to_path_buf)
        .or_else(|| path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn name_uses_stem_timestamp_and_extension() {
        let path = backup_path_for(Path::new("/data/report.pdf"), None, fixed_time());
        assert_eq!(path, PathBuf::from("/data/report_backup_20240309_140507.pdf"));

        let path = backup_path_for(Path::new("/data/report.pdf"), Some(Path::new("/safe")), fixed_time());
        assert_eq!(path, PathBuf::from("/safe/report_backup_20240309_140507.pdf"));
    }

    #[test]
    fn backup_copies_bytes_and_times() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("contract.pdf");
        fs::write(&input, b"%PDF-1.4 original").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_times(&input, old, old).unwrap();

        let backup_dir = dir.path().join("backups");
        let backup = BackupManager::new()
            .backup_at(&input, Some(&backup_dir), fixed_time())
            .unwrap();

        assert_eq!(fs::read(&backup).unwrap(), b"%PDF-1.4 original");
        assert_eq!(fs::read(&input).unwrap(), b"%PDF-1.4 original");
        let meta = fs::metadata(&backup).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("gone.pdf");
        let err = BackupManager::new()
            .backup(&input, &BackupPolicy::default())
            .unwrap_err();
        assert!(matches!(err, BackupError::Io { .. }));
    }
}
