//! Persisted engine settings
//!
//! Settings files are JSON or YAML. Every field has a default, so a partial
//! file only overrides what it names. The CLI turns an `EngineConfig` into
//! job policies; the engine itself never reads settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::CipherStrength;
use crate::error::{Error, Result};
use crate::types::{BackupFailureAction, BackupPolicy, OutputPolicy, OverwritePolicy, PermissionSet};
use crate::utils::io::ensure_parent_dir;
use crate::utils::logging::LogLevel;

/// Permissions granted to protected documents unless overridden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionDefaults {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
}

impl Default for PermissionDefaults {
    fn default() -> Self {
        Self {
            print: true,
            modify: false,
            copy: true,
            annotate: true,
        }
    }
}

impl From<PermissionDefaults> for PermissionSet {
    fn from(p: PermissionDefaults) -> Self {
        PermissionSet::from_flags(p.print, p.modify, p.copy, p.annotate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub create_backup: bool,
    pub backup_directory: Option<PathBuf>,
    pub overwrite_without_ask: bool,
    pub output_directory: Option<PathBuf>,
    pub default_permissions: PermissionDefaults,
    pub on_backup_failure: BackupFailureAction,
    pub cipher_strength: CipherStrength,
    pub keep_unprotected_copies: bool,
    pub max_concurrent_files: usize,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            create_backup: true,
            backup_directory: None,
            overwrite_without_ask: false,
            output_directory: None,
            default_permissions: PermissionDefaults::default(),
            on_backup_failure: BackupFailureAction::Ask,
            cipher_strength: CipherStrength::default(),
            keep_unprotected_copies: false,
            max_concurrent_files: 1,
            log_level: LogLevel::Info,
            log_file: None,
        }
    }
}

impl EngineConfig {
    /// Reads a settings file, trying JSON first and then YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read {}: {}", path.display(), e)))?;

        let config: EngineConfig = serde_json::from_str(&content)
            .or_else(|_| serde_yaml::from_str(&content))
            .map_err(|e| Error::ConfigError(format!("cannot parse {}: {}", path.display(), e)))?;

        config.validate()?;
        debug!(path = %path.display(), "settings loaded");
        Ok(config)
    }

    /// Writes the settings as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        ensure_parent_dir(path)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_files == 0 {
            return Err(Error::ConfigError(
                "max_concurrent_files must be at least 1".into(),
            ));
        }
        for dir in [&self.output_directory, &self.backup_directory].into_iter().flatten() {
            if dir.as_os_str().is_empty() {
                return Err(Error::ConfigError("directories must not be empty paths".into()));
            }
        }
        Ok(())
    }

    pub fn output_policy(&self) -> OutputPolicy {
        match &self.output_directory {
            Some(dir) => OutputPolicy::Directory(dir.clone()),
            None => OutputPolicy::Alongside,
        }
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        BackupPolicy {
            enabled: self.create_backup,
            directory: self.backup_directory.clone(),
            on_failure: self.on_backup_failure,
        }
    }

    pub fn overwrite_policy(&self) -> OverwritePolicy {
        OverwritePolicy {
            allow_without_asking: self.overwrite_without_ask,
        }
    }

    pub fn permissions(&self) -> PermissionSet {
        self.default_permissions.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_json_merges_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "create_backup": false, "default_permissions": { "modify": true } }"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.create_backup);
        assert_eq!(config.max_concurrent_files, 1);
        assert_eq!(config.permissions().bits(), 4 | 8 | 16 | 32);
        assert_eq!(config.cipher_strength, CipherStrength::Rc4_128);
    }

    #[test]
    fn yaml_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(
            &path,
            "overwrite_without_ask: true\ncipher_strength: rc4-40\non_backup_failure: proceed\nlog_level: debug\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(config.overwrite_policy().allow_without_asking);
        assert_eq!(config.cipher_strength, CipherStrength::Rc4_40);
        assert_eq!(config.backup_policy().on_failure, BackupFailureAction::Proceed);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{ "max_concurrent_files": 0 }"#).unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(Error::ConfigError(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let config = EngineConfig {
            output_directory: Some(dir.path().join("out")),
            max_concurrent_files: 4,
            ..EngineConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        assert_eq!(
            config.output_policy(),
            OutputPolicy::Directory(dir.path().join("out"))
        );
    }
}
