//! Editor surface: where the workflow reads the active document and talks
//! to the user.
//!
//! The orchestrator only knows this trait; the console implementation below
//! treats the file named on the command line as the active document and
//! prompts on stdin, mirroring how an editor-integrated frontend would show
//! a confirmation dialog.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::warn;

/// The currently open document: its path and current (possibly unsaved,
/// from the surface's point of view) text.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
}

/// User's answer to the blocking change-summary prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Continue,
    Abort,
}

#[async_trait]
pub trait Editor: Send + Sync {
    /// The active document, or `None` when nothing is open.
    fn active_document(&self) -> Option<Document>;

    /// Show an informational or error message to the user.
    fn show_message(&self, text: &str);

    /// Present `prompt` as a blocking Continue/Abort choice. A dismissed
    /// prompt counts as Abort.
    async fn confirm(&self, prompt: &str) -> Confirmation;
}

/// Console-backed editor surface for the CLI.
pub struct ConsoleEditor {
    path: PathBuf,
}

impl ConsoleEditor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Editor for ConsoleEditor {
    fn active_document(&self) -> Option<Document> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Some(Document {
                path: self.path.clone(),
                text,
            }),
            Err(e) => {
                warn!("cannot read {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn show_message(&self, text: &str) {
        println!("{}", text);
    }

    async fn confirm(&self, prompt: &str) -> Confirmation {
        println!("{}", prompt);
        print!("Continue with deployment? [y/N]: ");
        if std::io::stdout().flush().is_err() {
            return Confirmation::Abort;
        }

        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return Confirmation::Abort;
        }

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Confirmation::Continue,
            _ => Confirmation::Abort,
        }
    }
}
