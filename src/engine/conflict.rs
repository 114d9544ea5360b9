//! Existing-output handling

use std::path::Path;

use tracing::{debug, warn};

use crate::engine::confirm::{Confirmation, ConfirmationSource};
use crate::types::OverwritePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Proceed,
    Skip,
}

#[derive(Debug, Default, Clone)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        output: &Path,
        policy: OverwritePolicy,
        confirmation: &dyn ConfirmationSource,
    ) -> Resolution {
        if !output.exists() {
            return Resolution::Proceed;
        }
        if policy.allow_without_asking {
            debug!(output = %output.display(), "overwriting existing output");
            return Resolution::Proceed;
        }

        let question = Confirmation::Overwrite {
            output: output.to_path_buf(),
        };
        if confirmation.confirm(&question) {
            Resolution::Proceed
        } else {
            warn!(output = %output.display(), "output exists, skipping");
            Resolution::Skip
        }
    }
}
