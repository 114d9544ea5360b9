//! Yes/no decisions the engine cannot make on its own
//!
//! The orchestrator never reads stdin. It asks a `ConfirmationSource`, which
//! is either policy driven (unattended runs) or backed by a terminal.

use std::fmt;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::warn;

/// A question raised while processing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The output path already exists
    Overwrite { output: PathBuf },
    /// The backup failed; carry on without one?
    ContinueWithoutBackup { input: PathBuf, error: String },
    /// The input is already protected; replace its protection?
    Reencrypt { input: PathBuf },
}

impl Confirmation {
    /// Answer given when nobody can be asked
    pub fn unattended_answer(&self) -> bool {
        match self {
            Confirmation::Overwrite { .. } => false,
            Confirmation::ContinueWithoutBackup { .. } => false,
            Confirmation::Reencrypt { .. } => true,
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confirmation::Overwrite { output } => {
                write!(f, "Output file {} exists. Overwrite?", output.display())
            }
            Confirmation::ContinueWithoutBackup { input, error } => write!(
                f,
                "Backup of {} failed ({}). Continue without backup?",
                input.display(),
                error
            ),
            Confirmation::Reencrypt { input } => write!(
                f,
                "{} is already password protected. Re-encrypt it with the new password?",
                input.display()
            ),
        }
    }
}

pub trait ConfirmationSource: Send + Sync {
    fn confirm(&self, question: &Confirmation) -> bool;
}

/// Answers every question with its unattended default
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyConfirmation;

impl ConfirmationSource for PolicyConfirmation {
    fn confirm(&self, question: &Confirmation) -> bool {
        question.unattended_answer()
    }
}

/// Asks on a terminal-like reader/writer pair. Anything other than `y` or
/// `yes` is a no, and so is end of input.
pub struct InteractiveConfirmation<R, W> {
    io: Mutex<(R, W)>,
}

impl InteractiveConfirmation<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> InteractiveConfirmation<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    fn ask(&self, question: &Confirmation) -> io::Result<bool> {
        let mut guard = self
            .io
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "confirmation lock poisoned"))?;
        let (reader, writer) = &mut *guard;

        write!(writer, "{} (y/N): ", question)?;
        writer.flush()?;

        let mut answer = String::new();
        reader.read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

impl<R: BufRead + Send, W: Write + Send> ConfirmationSource for InteractiveConfirmation<R, W> {
    fn confirm(&self, question: &Confirmation) -> bool {
        self.ask(question).unwrap_or_else(|err| {
            warn!(error = %err, "could not read confirmation, assuming no");
            false
        })
    }
}
