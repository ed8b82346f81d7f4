#![allow(dead_code)]

//! tmux-backed picker terminals.
//!
//! The low-level helpers shell out to `tmux` and parse its `-F` formatted
//! output; `SessionManager` layers the find-or-create-per-role policy on
//! top. Session handles are revalidated against `list-sessions` on every
//! show, so a terminal the user closed is recreated on the next invocation.

use std::collections::HashMap;
use std::path::Path;

use tokio::process::Command;
use tokio::sync::RwLock;

use crate::errors::{Error, Result};
use crate::types::{Session, TerminalRole};

const SESSION_FORMAT: &str =
    "#{session_id}\t#{session_name}\t#{?session_attached,1,0}\t#{session_windows}";

/// Resolve the tmux socket path from an override or environment variable.
pub fn resolve_socket(socket: Option<&str>) -> Option<String> {
    if let Some(socket) = socket {
        if socket.is_empty() {
            return None;
        }
        return Some(socket.to_string());
    }
    match std::env::var("FZF_MCP_SOCKET") {
        Ok(socket) if !socket.is_empty() => Some(socket),
        _ => None,
    }
}

/// Execute a tmux command with the given arguments and return stdout.
pub async fn execute_tmux(args: &[&str], socket: Option<&str>) -> Result<String> {
    let mut tmux_args: Vec<String> = match resolve_socket(socket) {
        Some(socket) => vec!["-S".to_string(), socket],
        None => vec![],
    };
    tmux_args.extend(args.iter().map(|arg| (*arg).to_string()));

    let output = Command::new("tmux")
        .args(&tmux_args)
        .output()
        .await
        .map_err(|e| Error::Terminal {
            message: format!("failed to spawn tmux: {e}"),
        })?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(Error::Terminal { message: stderr })
    }
}

/// Parse `list-sessions -F '#{session_id}\t#{session_name}\t#{?session_attached,1,0}\t#{session_windows}'`
pub fn parse_sessions(output: &str) -> Vec<Session> {
    if output.is_empty() {
        return Vec::new();
    }

    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() >= 4 {
                Some(Session {
                    id: parts[0].to_string(),
                    name: parts[1].to_string(),
                    attached: parts[2] == "1",
                    windows: parts[3].parse().unwrap_or(0),
                })
            } else {
                None
            }
        })
        .collect()
}

/// List all tmux sessions. An absent tmux server means no sessions.
pub async fn list_sessions(socket: Option<&str>) -> Result<Vec<Session>> {
    match execute_tmux(&["list-sessions", "-F", SESSION_FORMAT], socket).await {
        Ok(output) => Ok(parse_sessions(&output)),
        Err(Error::Terminal { ref message }) if message.contains("no server running") => {
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Find a session by name.
pub async fn find_session_by_name(name: &str, socket: Option<&str>) -> Result<Option<Session>> {
    let sessions = list_sessions(socket).await?;
    Ok(sessions.into_iter().find(|s| s.name == name))
}

/// Create a new detached tmux session, optionally rooted at `cwd`.
pub async fn create_session(
    name: &str,
    cwd: Option<&Path>,
    socket: Option<&str>,
) -> Result<Session> {
    let cwd = cwd.map(|p| p.display().to_string());
    let mut args = vec!["new-session", "-d", "-P", "-F", SESSION_FORMAT, "-s", name];
    if let Some(cwd) = cwd.as_deref() {
        args.push("-c");
        args.push(cwd);
    }

    let output = execute_tmux(&args, socket).await?;

    let parts: Vec<&str> = output.split('\t').collect();
    if parts.len() >= 4 {
        Ok(Session {
            id: parts[0].to_string(),
            name: parts[1].to_string(),
            attached: parts[2] == "1",
            windows: parts[3].parse().unwrap_or(1),
        })
    } else {
        Err(Error::Terminal {
            message: format!("failed to parse new session output: {output}"),
        })
    }
}

/// Send keys to a session's active pane.
pub async fn send_keys(session_id: &str, keys: &str, socket: Option<&str>) -> Result<()> {
    execute_tmux(&["send-keys", "-t", session_id, keys], socket).await?;
    Ok(())
}

/// Switch the attached client to a session. Fails when no client is
/// attached, which callers treat as best-effort.
pub async fn switch_client(session_id: &str, socket: Option<&str>) -> Result<()> {
    execute_tmux(&["switch-client", "-t", session_id], socket).await?;
    Ok(())
}

/// Finds or creates the picker terminal for each role and sends command
/// text to it.
#[derive(Debug)]
pub struct SessionManager {
    socket: Option<String>,
    sessions: RwLock<HashMap<TerminalRole, Session>>,
}

impl SessionManager {
    /// Create a manager using the given tmux socket override.
    pub fn new(socket: Option<String>) -> Self {
        Self {
            socket,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn socket(&self) -> Option<&str> {
        self.socket.as_deref()
    }

    /// Find or create the terminal for `role` and bring it to the
    /// foreground.
    ///
    /// An existing session with the role's name is reused. Otherwise a new
    /// one is created, rooted at `initial_cwd` when configured, falling
    /// back to `fallback_cwd` (the active document's directory).
    pub async fn show(
        &self,
        role: TerminalRole,
        initial_cwd: &str,
        fallback_cwd: Option<&Path>,
    ) -> Result<Session> {
        let name = role.display_name();
        let live = find_session_by_name(name, self.socket()).await?;

        let mut cache = self.sessions.write().await;
        let session = match live {
            Some(session) => session,
            None => {
                // The cached handle, if any, points at a closed session.
                cache.remove(&role);
                let cwd = if initial_cwd.is_empty() {
                    fallback_cwd
                } else {
                    Some(Path::new(initial_cwd))
                };
                tracing::debug!(session = name, cwd = ?cwd, "creating picker terminal");
                create_session(name, cwd, self.socket()).await?
            }
        };
        cache.insert(role, session.clone());
        drop(cache);

        if let Err(e) = switch_client(&session.id, self.socket()).await {
            tracing::trace!(session = name, error = %e, "could not foreground session");
        }

        Ok(session)
    }

    /// Type `text` into the session and press Enter.
    pub async fn send_text(&self, session: &Session, text: &str) -> Result<()> {
        send_keys(&session.id, text, self.socket()).await?;
        send_keys(&session.id, "Enter", self.socket()).await
    }

    /// Change the session's shell to `dir`.
    pub async fn move_to_working_directory(&self, session: &Session, dir: &Path) -> Result<()> {
        let cd = format!("cd {}", shell_words::quote(&dir.display().to_string()));
        self.send_text(session, &cd).await
    }

    /// Drop the cached handle for `role`; the next show recreates it.
    pub async fn forget(&self, role: TerminalRole) {
        self.sessions.write().await.remove(&role);
    }

    /// The cached session for `role`, if any.
    pub async fn cached(&self, role: TerminalRole) -> Option<Session> {
        self.sessions.read().await.get(&role).cloned()
    }
}
