//! Terminal side of the engine's prompting and progress hooks.

use std::io::{self, IsTerminal};

use dialoguer::{Input, Password};
use ol_sync_core::{CredentialPrompter, Progress, ProgressSink};

/// Prompts on the controlling terminal; refuses when stdin is redirected.
pub struct TerminalPrompter;

impl CredentialPrompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }

    fn prompt_email(&self) -> io::Result<String> {
        let email: String = Input::new()
            .with_prompt("Overleaf email")
            .interact_text()
            .map_err(io::Error::other)?;
        Ok(email.trim().to_string())
    }

    fn prompt_password(&self) -> io::Result<String> {
        Password::new()
            .with_prompt("Overleaf password")
            .interact()
            .map_err(io::Error::other)
    }
}

/// Prints engine events as the line-oriented output consumers parse.
///
/// With `json` set, informational lines move to stderr so stdout carries a
/// single JSON document.
pub struct ConsoleProgress {
    json: bool,
}

impl ConsoleProgress {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn info(&self, line: &str) {
        if self.json {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, event: Progress) {
        match event {
            Progress::SessionCached(path) => {
                self.info(&format!("Session cached at {}", path.display()))
            }
            Progress::Watching {
                dir,
                base_url,
                project_id,
            } => {
                self.info(&format!("Watching {}", dir.display()));
                self.info(&format!("→ {} project={}", base_url, project_id));
            }
            Progress::DryRun(path) => self.info(&format!("[dry-run] upload {}", path)),
            Progress::Uploaded(path) => tracing::debug!("uploaded {}", path),
            Progress::Synced(path) => self.info(&format!("synced {}", path)),
            Progress::Failed { message, .. } => eprintln!("{}", message),
            Progress::WatchError(message) => eprintln!("watch error: {}", message),
        }
    }
}
