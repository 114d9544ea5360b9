//! Codec calls per file, translated into engine outcomes
//!
//! A transform runs in two steps. `prepare` opens the input and settles
//! every question that decides whether anything gets written: protection
//! state, password checks and the re-encrypt confirmation. `write` then
//! copies the pages to the output. Overwrite checks belong between the two.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::{CipherStrength, DocumentCodec};
use crate::engine::confirm::{Confirmation, ConfirmationSource};
use crate::error::TransformError;
use crate::types::{FileOutcome, Job, PasswordMaterial, PermissionSet, Secret};

/// Result of a successful transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub outcome: FileOutcome,
    /// Whether a document was written to the output path
    pub written: bool,
}

/// An input that passed every check short of writing
pub enum Prepared<H> {
    /// Already in the target state
    Noop,
    /// Readable document to be written, and the outcome once it is
    Ready { handle: H, outcome: FileOutcome },
}

impl<H> Prepared<H> {
    pub fn will_write(&self) -> bool {
        matches!(self, Prepared::Ready { .. })
    }
}

/// Credentials and settings for protecting one document
#[derive(Debug, Clone, Copy)]
pub struct Protection<'a> {
    pub user: &'a Secret,
    pub owner: &'a Secret,
    pub permissions: PermissionSet,
    pub strength: CipherStrength,
}

impl<'a> Protection<'a> {
    /// Protection requested by an add job, `None` for removal
    pub fn for_job(job: &'a Job) -> Option<Self> {
        match job.passwords() {
            PasswordMaterial::Add { user, owner, .. } => Some(Protection {
                user,
                owner,
                permissions: job.permissions(),
                strength: job.cipher(),
            }),
            PasswordMaterial::Remove { .. } => None,
        }
    }
}

pub struct TransformInvoker<C: DocumentCodec> {
    codec: Arc<C>,
}

impl<C: DocumentCodec> Clone for TransformInvoker<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<C: DocumentCodec> TransformInvoker<C> {
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec }
    }

    /// Prepares and writes in one go, with no overwrite check in between
    pub fn invoke(
        &self,
        job: &Job,
        input: &Path,
        output: &Path,
        confirmation: &dyn ConfirmationSource,
    ) -> Result<Transformed, TransformError> {
        let prepared = self.prepare(job, input, confirmation)?;
        self.write(job, prepared, output)
    }

    /// Opens `input` and decides what the job's operation will do with it
    pub fn prepare(
        &self,
        job: &Job,
        input: &Path,
        confirmation: &dyn ConfirmationSource,
    ) -> Result<Prepared<C::Handle>, TransformError> {
        match job.passwords() {
            PasswordMaterial::Remove { current } => {
                self.prepare_remove(input, current, job.keep_unprotected_copy())
            }
            PasswordMaterial::Add { existing, .. } => {
                self.prepare_add(input, existing.as_ref(), confirmation)
            }
        }
    }

    /// Unprotected inputs are a noop unless `keep_copy` asks for an
    /// unprotected copy. Protected inputs must accept `password`.
    pub fn prepare_remove(
        &self,
        input: &Path,
        password: &Secret,
        keep_copy: bool,
    ) -> Result<Prepared<C::Handle>, TransformError> {
        let mut handle = self.codec.open(input)?;

        if !self.codec.is_protected(&handle) {
            info!(input = %input.display(), "not password protected, nothing to remove");
            if !keep_copy {
                return Ok(Prepared::Noop);
            }
            return Ok(Prepared::Ready {
                handle,
                outcome: FileOutcome::SuccessNoop,
            });
        }

        if !self.codec.verify_password(&mut handle, password.as_bytes())? {
            return Err(TransformError::WrongPassword);
        }
        Ok(Prepared::Ready {
            handle,
            outcome: FileOutcome::Success,
        })
    }

    /// Already-protected inputs are re-encrypted only once the confirmation
    /// source agrees, and only if the existing password or the empty one
    /// opens them.
    pub fn prepare_add(
        &self,
        input: &Path,
        existing: Option<&Secret>,
        confirmation: &dyn ConfirmationSource,
    ) -> Result<Prepared<C::Handle>, TransformError> {
        let mut handle = self.codec.open(input)?;
        if !self.codec.is_protected(&handle) {
            return Ok(Prepared::Ready {
                handle,
                outcome: FileOutcome::Success,
            });
        }

        let question = Confirmation::Reencrypt {
            input: input.to_path_buf(),
        };
        if !confirmation.confirm(&question) {
            return Err(TransformError::AlreadyProtected);
        }

        let mut candidates: Vec<&[u8]> = Vec::with_capacity(2);
        if let Some(existing) = existing {
            candidates.push(existing.as_bytes());
        }
        candidates.push(b"");

        for candidate in candidates {
            if self.codec.verify_password(&mut handle, candidate)? {
                debug!(input = %input.display(), "existing protection opened");
                return Ok(Prepared::Ready {
                    handle,
                    outcome: FileOutcome::SuccessReencrypted,
                });
            }
        }
        Err(TransformError::WrongPassword)
    }

    /// Writes a prepared input to `output`, protected if the job adds a
    /// password
    pub fn write(
        &self,
        job: &Job,
        prepared: Prepared<C::Handle>,
        output: &Path,
    ) -> Result<Transformed, TransformError> {
        match prepared {
            Prepared::Noop => Ok(Transformed {
                outcome: FileOutcome::SuccessNoop,
                written: false,
            }),
            Prepared::Ready { handle, outcome } => {
                self.copy_pages(&handle, output, Protection::for_job(job).as_ref())?;
                Ok(Transformed {
                    outcome,
                    written: true,
                })
            }
        }
    }

    fn copy_pages(
        &self,
        handle: &C::Handle,
        output: &Path,
        protection: Option<&Protection<'_>>,
    ) -> Result<(), TransformError> {
        let pages = self.codec.pages(handle);
        let mut container = self.codec.new_container();
        for page in &pages {
            self.codec.add_page(&mut container, handle, *page)?;
        }

        if let Some(p) = protection {
            self.codec.encrypt(
                &mut container,
                p.user.as_bytes(),
                p.owner.as_bytes(),
                p.permissions.bits(),
                p.strength,
            )?;
        }

        self.codec.write(container, output)?;
        debug!(output = %output.display(), pages = pages.len(), "pages copied");
        Ok(())
    }
}
