//! Input path checks

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ValidationError;
use crate::utils::io::{has_allowed_extension, read_prefix};

const PDF_EXTENSIONS: &[&str] = &["pdf"];
const PDF_MAGIC: &[u8] = b"%PDF";

/// Confirms an input is an existing, readable file with a PDF extension and
/// header. Never parses the document and never writes.
#[derive(Debug, Clone)]
pub struct PathValidator {
    extensions: &'static [&'static str],
    magic: &'static [u8],
}

impl Default for PathValidator {
    fn default() -> Self {
        Self {
            extensions: PDF_EXTENSIONS,
            magic: PDF_MAGIC,
        }
    }
}

impl PathValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, path: &Path) -> Result<(), ValidationError> {
        let is_file = fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            return Err(ValidationError::NotFound(path.to_path_buf()));
        }

        if !has_allowed_extension(path, self.extensions) {
            return Err(ValidationError::WrongExtension(path.to_path_buf()));
        }

        let header = read_prefix(path, self.magic.len())
            .map_err(|_| ValidationError::Unreadable(path.to_path_buf()))?;

        if header != self.magic {
            return Err(ValidationError::BadHeader(path.to_path_buf()));
        }

        debug!(path = %path.display(), "input validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn accepts_pdf_header_with_uppercase_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "SCAN.PDF", b"%PDF-1.7\n");
        assert_eq!(PathValidator::new().validate(&path), Ok(()));
    }

    #[test]
    fn checks_run_in_order() {
        let dir = TempDir::new().unwrap();
        let validator = PathValidator::new();

        let missing = dir.path().join("missing.txt");
        assert_eq!(
            validator.validate(&missing),
            Err(ValidationError::NotFound(missing.clone()))
        );

        let text = write(&dir, "notes.txt", b"%PDF-1.4");
        assert_eq!(
            validator.validate(&text),
            Err(ValidationError::WrongExtension(text.clone()))
        );

        let short = write(&dir, "short.pdf", b"%P");
        assert_eq!(
            validator.validate(&short),
            Err(ValidationError::BadHeader(short.clone()))
        );

        let html = write(&dir, "page.pdf", b"<html>");
        assert_eq!(
            validator.validate(&html),
            Err(ValidationError::BadHeader(html.clone()))
        );
    }

    #[test]
    fn directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("folder.pdf");
        fs::create_dir(&sub).unwrap();
        assert_eq!(
            PathValidator::new().validate(&sub),
            Err(ValidationError::NotFound(sub.clone()))
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write(&dir, "locked.pdf", b"%PDF-1.4");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores file modes
        if fs::File::open(&path).is_ok() {
            return;
        }
        assert_eq!(
            PathValidator::new().validate(&path),
            Err(ValidationError::Unreadable(path.clone()))
        );
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    }
}
