//! Dispatches decoded relay messages to the editor CLI.
//!
//! Path resolution failures are silent by design: a picker selection that
//! no longer exists on disk means the user gets nothing, not an error
//! notification. Only genuine spawn failures surface as errors.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::errors::{Error, Result};
use crate::settings::{self, EditorConfig, SharedSettings};
use crate::types::{CursorTarget, RelayCommand, RelayMessage};

/// Split a vimgrep-style `file:line:column[:match]` argument into the file
/// and a zero-based cursor target. Line and column are 1-based on the wire.
pub fn parse_rg_argument(argument: &str) -> Option<(&str, CursorTarget)> {
    let parts: Vec<&str> = argument.split(':').collect();
    if parts.len() < 3 {
        return None;
    }

    let line: u32 = parts[1].trim().parse().ok()?;
    let column: u32 = parts[2].trim().parse().ok()?;
    Some((
        parts[0],
        CursorTarget {
            line: line.saturating_sub(1),
            column: column.saturating_sub(1),
        },
    ))
}

/// Resolve `argument` against the message's working directory and check it
/// exists. `None` means the message is dropped.
async fn resolve_path(argument: &str, working_directory: &Path) -> Option<PathBuf> {
    let candidate = if Path::new(argument).is_absolute() {
        PathBuf::from(argument)
    } else {
        working_directory.join(argument)
    };

    match tokio::fs::try_exists(&candidate).await {
        Ok(true) => Some(candidate),
        _ => {
            tracing::trace!(path = %candidate.display(), "dropping message for missing path");
            None
        }
    }
}

/// Turns relay messages into editor CLI invocations.
pub struct ActionDispatcher {
    settings: SharedSettings,
}

impl ActionDispatcher {
    /// Create a dispatcher reading the editor configuration from the
    /// shared settings snapshot on every message.
    pub fn new(settings: SharedSettings) -> Self {
        Self { settings }
    }

    /// Handle one decoded message. Missing paths and unparseable cursors
    /// are silent no-ops; a failing editor spawn is an error.
    pub async fn dispatch(&self, message: RelayMessage) -> Result<()> {
        let editor = settings::snapshot(&self.settings).editor;

        match message.command {
            RelayCommand::Open => {
                let Some(path) = resolve_path(&message.argument, &message.working_directory).await
                else {
                    return Ok(());
                };
                tracing::debug!(path = %path.display(), "opening file");
                self.run_editor(&editor, &[editor.goto_flag.clone(), path.display().to_string()])
                    .await
            }
            RelayCommand::Add => {
                let Some(path) = resolve_path(&message.argument, &message.working_directory).await
                else {
                    return Ok(());
                };
                tracing::debug!(path = %path.display(), "adding workspace folder");
                self.run_editor(&editor, &[editor.add_flag.clone(), path.display().to_string()])
                    .await
            }
            RelayCommand::Rg => {
                let Some((file, cursor)) = parse_rg_argument(&message.argument) else {
                    tracing::trace!(argument = %message.argument, "dropping unparseable rg argument");
                    return Ok(());
                };
                let Some(path) = resolve_path(file, &message.working_directory).await else {
                    return Ok(());
                };
                tracing::debug!(path = %path.display(), line = cursor.line, column = cursor.column, "jumping to match");
                // The editor CLI speaks 1-based positions.
                let target = format!("{}:{}:{}", path.display(), cursor.line + 1, cursor.column + 1);
                self.run_editor(&editor, &[editor.goto_flag.clone(), target])
                    .await
            }
        }
    }

    async fn run_editor(&self, editor: &EditorConfig, args: &[String]) -> Result<()> {
        let mut words = shell_words::split(&editor.command).map_err(|e| Error::Editor {
            message: format!("invalid editor command: {e}"),
        })?;
        if words.is_empty() {
            return Err(Error::InvalidArgument {
                message: "editor command is empty".to_string(),
            });
        }
        let program = words.remove(0);

        let output = Command::new(&program)
            .args(&words)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Editor {
                message: format!("failed to spawn {program}: {e}"),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(Error::Editor { message: stderr })
        }
    }
}
