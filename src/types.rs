#![allow(dead_code)]

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Summary of a tmux session hosting a picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub attached: bool,
    pub windows: u32,
}

/// Logical role of a picker terminal. At most one live session exists per
/// role; the display name is how the session is found among open ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalRole {
    /// The long-lived picker terminal rooted at the initial directory.
    Primary,
    /// A picker terminal that follows the active document's directory.
    CwdScoped,
}

impl TerminalRole {
    /// Session name used to find or create the terminal for this role.
    pub fn display_name(self) -> &'static str {
        match self {
            TerminalRole::Primary => "fzf picker",
            TerminalRole::CwdScoped => "fzf picker (cwd)",
        }
    }
}

/// Kind of editor action requested over the relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Open the selected file as a document.
    Open,
    /// Add the selected directory to the workspace.
    Add,
    /// Jump to a `file:line:column` ripgrep match.
    Rg,
}

impl RelayCommand {
    /// Parse the wire name of a command. Unknown names are dropped by the
    /// listener, so this returns `None` rather than an error.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "open" => Some(RelayCommand::Open),
            "add" => Some(RelayCommand::Add),
            "rg" => Some(RelayCommand::Rg),
            _ => None,
        }
    }
}

/// One decoded relay line: `command$$workingDirectory$$argument`.
///
/// Transient; parsed by the channel listener and consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub command: RelayCommand,
    pub working_directory: PathBuf,
    pub argument: String,
}

/// Zero-based cursor target decoded from an `rg` argument.
///
/// The wire format carries 1-based line/column; conversion happens at parse
/// time so everything downstream is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorTarget {
    pub line: u32,
    pub column: u32,
}
