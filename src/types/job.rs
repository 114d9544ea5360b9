//! Job description for one batch run
//!
//! A `Job` is assembled once through `JobBuilder`, which enforces the
//! run-level invariants (at least one input, explicit output only for a single
//! input, owner password resolved up front). After `build()` nothing about the
//! job can change; the orchestrator owns it until the run completes and the
//! password material is wiped on drop.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::codec::CipherStrength;
use crate::error::JobError;
use crate::types::Secret;

/// Target access-control transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    AddPassword,
    RemovePassword,
}

impl Operation {
    /// Filename prefix used when the output path is derived from the input
    pub fn output_prefix(&self) -> &'static str {
        match self {
            Operation::AddPassword => "protected_",
            Operation::RemovePassword => "unlocked_",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::AddPassword => write!(f, "Add Password"),
            Operation::RemovePassword => write!(f, "Remove Password"),
        }
    }
}

/// Credentials shared read-only by every file in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordMaterial {
    Remove {
        current: Secret,
    },
    Add {
        user: Secret,
        owner: Secret,
        /// Opens inputs that are already protected before re-encrypting them
        existing: Option<Secret>,
    },
}

impl PasswordMaterial {
    pub fn operation(&self) -> Operation {
        match self {
            PasswordMaterial::Remove { .. } => Operation::RemovePassword,
            PasswordMaterial::Add { .. } => Operation::AddPassword,
        }
    }
}

bitflags! {
    /// Capabilities granted to users of a protected document.
    ///
    /// The bit values are shared with the codec and end up verbatim in the
    /// document's permission entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionSet: u32 {
        const PRINT = 4;
        const MODIFY = 8;
        const COPY = 16;
        const ANNOTATE = 32;
    }
}

impl PermissionSet {
    pub fn from_flags(print: bool, modify: bool, copy: bool, annotate: bool) -> Self {
        let mut set = PermissionSet::empty();
        set.set(PermissionSet::PRINT, print);
        set.set(PermissionSet::MODIFY, modify);
        set.set(PermissionSet::COPY, copy);
        set.set(PermissionSet::ANNOTATE, annotate);
        set
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        PermissionSet::PRINT | PermissionSet::COPY | PermissionSet::ANNOTATE
    }
}

/// Where output documents are written
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputPolicy {
    /// Exact output path; only valid for a single-input job
    Explicit(PathBuf),
    /// `<dir>/<prefix><basename>`
    Directory(PathBuf),
    /// `<input dir>/<prefix><basename>`
    #[default]
    Alongside,
}

impl OutputPolicy {
    pub fn resolve(&self, input: &Path, operation: Operation) -> PathBuf {
        let derived_name = || {
            let mut name = OsStr::new(operation.output_prefix()).to_os_string();
            name.push(input.file_name().unwrap_or_else(|| OsStr::new("document.pdf")));
            name
        };

        match self {
            OutputPolicy::Explicit(path) => path.clone(),
            OutputPolicy::Directory(dir) => dir.join(derived_name()),
            OutputPolicy::Alongside => input
                .parent()
                .map(|parent| parent.join(derived_name()))
                .unwrap_or_else(|| PathBuf::from(derived_name())),
        }
    }
}

/// What to do when a backup cannot be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFailureAction {
    /// Record the file as failed
    Abort,
    /// Carry on without a backup
    Proceed,
    /// Let the confirmation source decide
    #[default]
    Ask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPolicy {
    pub enabled: bool,
    /// Defaults to the input file's directory
    pub directory: Option<PathBuf>,
    pub on_failure: BackupFailureAction,
}

impl BackupPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            on_failure: BackupFailureAction::Ask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverwritePolicy {
    pub allow_without_asking: bool,
}

/// One immutable batch invocation
#[derive(Debug)]
pub struct Job {
    inputs: Vec<PathBuf>,
    passwords: PasswordMaterial,
    output: OutputPolicy,
    backup: BackupPolicy,
    overwrite: OverwritePolicy,
    permissions: PermissionSet,
    cipher: CipherStrength,
    keep_unprotected_copy: bool,
}

impl Job {
    pub fn operation(&self) -> Operation {
        self.passwords.operation()
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn passwords(&self) -> &PasswordMaterial {
        &self.passwords
    }

    pub fn output_policy(&self) -> &OutputPolicy {
        &self.output
    }

    pub fn backup_policy(&self) -> &BackupPolicy {
        &self.backup
    }

    pub fn overwrite_policy(&self) -> OverwritePolicy {
        self.overwrite
    }

    pub fn permissions(&self) -> PermissionSet {
        self.permissions
    }

    pub fn cipher(&self) -> CipherStrength {
        self.cipher
    }

    pub fn keep_unprotected_copy(&self) -> bool {
        self.keep_unprotected_copy
    }

    pub fn output_for(&self, input: &Path) -> PathBuf {
        self.output.resolve(input, self.operation())
    }
}

/// Builder for [`Job`]
#[derive(Debug)]
pub struct JobBuilder {
    inputs: Vec<PathBuf>,
    passwords: PasswordMaterial,
    output: OutputPolicy,
    backup: BackupPolicy,
    overwrite: OverwritePolicy,
    permissions: PermissionSet,
    cipher: CipherStrength,
    keep_unprotected_copy: bool,
}

impl JobBuilder {
    /// Starts a job that strips protection using `current` as the password
    pub fn remove(current: impl Into<Secret>) -> Self {
        Self::with_passwords(PasswordMaterial::Remove {
            current: current.into(),
        })
    }

    /// Starts a job that applies protection. An empty owner password falls
    /// back to the user password when the job is built.
    pub fn add(user: impl Into<Secret>, owner: impl Into<Secret>) -> Self {
        Self::with_passwords(PasswordMaterial::Add {
            user: user.into(),
            owner: owner.into(),
            existing: None,
        })
    }

    fn with_passwords(passwords: PasswordMaterial) -> Self {
        Self {
            inputs: Vec::new(),
            passwords,
            output: OutputPolicy::default(),
            backup: BackupPolicy::default(),
            overwrite: OverwritePolicy::default(),
            permissions: PermissionSet::default(),
            cipher: CipherStrength::default(),
            keep_unprotected_copy: false,
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, policy: OutputPolicy) -> Self {
        self.output = policy;
        self
    }

    pub fn backup(mut self, policy: BackupPolicy) -> Self {
        self.backup = policy;
        self
    }

    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    pub fn permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn cipher(mut self, cipher: CipherStrength) -> Self {
        self.cipher = cipher;
        self
    }

    /// Password for inputs that are already protected (add only)
    pub fn existing_password(mut self, password: impl Into<Secret>) -> Self {
        if let PasswordMaterial::Add { existing, .. } = &mut self.passwords {
            *existing = Some(password.into());
        }
        self
    }

    /// Still write an unprotected copy when a removal input has no password
    pub fn keep_unprotected_copy(mut self, keep: bool) -> Self {
        self.keep_unprotected_copy = keep;
        self
    }

    pub fn build(self) -> Result<Job, JobError> {
        let mut seen = HashSet::new();
        let inputs: Vec<PathBuf> = self
            .inputs
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .collect();

        if inputs.is_empty() {
            return Err(JobError::EmptyInputs);
        }
        if matches!(self.output, OutputPolicy::Explicit(_)) && inputs.len() > 1 {
            return Err(JobError::ExplicitOutputWithMultipleInputs(inputs.len()));
        }

        let passwords = match self.passwords {
            PasswordMaterial::Add { user, owner, existing } => {
                let owner = if owner.is_empty() { user.clone() } else { owner };
                PasswordMaterial::Add { user, owner, existing }
            }
            remove => remove,
        };

        Ok(Job {
            inputs,
            passwords,
            output: self.output,
            backup: self.backup,
            overwrite: self.overwrite,
            permissions: self.permissions,
            cipher: self.cipher,
            keep_unprotected_copy: self.keep_unprotected_copy,
        })
    }
}
