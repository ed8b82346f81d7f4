//! MCP server implementation for fzf-mcp-rs.
//!
//! Each tool shows the picker terminal for its role, composes the shell
//! pipeline, and types it into the terminal. The user's eventual selection
//! arrives over the relay channel, not through the tool result, so every
//! tool returns immediately with the session and command it launched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::schemars::JsonSchema;
use rmcp::serde::{Deserialize, Serialize};
use rmcp::serde_json;
use rmcp::tool;
use rmcp::tool_router;
use rmcp::ErrorData as McpError;

use crate::pipeline;
use crate::settings::{self, Settings, SharedSettings};
use crate::terminal::SessionManager;
use crate::types::TerminalRole;

/// The main MCP server for picker operations.
#[derive(Clone)]
pub struct FzfMcpServer {
    settings: SharedSettings,
    sessions: Arc<SessionManager>,
    channel_address: String,
    default_pipe_script: PathBuf,
    tool_router: ToolRouter<Self>,
}

fn structured_output<T: Serialize>(value: &T) -> CallToolResult {
    match serde_json::to_value(value) {
        Ok(json) => CallToolResult::structured(json),
        Err(e) => CallToolResult::error(vec![Content::text(format!(
            "Error serializing output: {e}"
        ))]),
    }
}

// ============================================================================
// Tool Input/Output Schemas
// ============================================================================

/// Input parameters for file and folder picker tools.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PickInput {
    /// Directory of the active document. Used as the cwd fallback for new
    /// terminals and as the target of cwd-scoped pickers.
    pub cwd: Option<String>,
}

/// Input parameters for content search tools.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// Ripgrep pattern to search for.
    pub pattern: String,
    /// Directory of the active document. Used as the cwd fallback for new
    /// terminals and as the target of cwd-scoped pickers.
    pub cwd: Option<String>,
}

/// Output payload for every picker tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LaunchOutput {
    /// Name of the tmux session the pipeline was sent to.
    pub session: String,
    /// The exact command line the terminal runs.
    pub command: String,
}

// ============================================================================
// Tool Router Implementation
// ============================================================================

#[tool_router]
impl FzfMcpServer {
    /// Create a new MCP server wired to a session manager and relay
    /// channel address.
    pub fn new(
        settings: SharedSettings,
        sessions: Arc<SessionManager>,
        channel_address: String,
        default_pipe_script: PathBuf,
    ) -> Self {
        Self {
            settings,
            sessions,
            channel_address,
            default_pipe_script,
            tool_router: Self::tool_router(),
        }
    }

    fn pipe_script(&self, snapshot: &Settings) -> PathBuf {
        snapshot
            .picker
            .pipe_script
            .clone()
            .unwrap_or_else(|| self.default_pipe_script.clone())
    }

    /// Show the role's terminal, optionally cd it to the active document's
    /// directory, and type the pipeline into it.
    async fn launch(
        &self,
        role: TerminalRole,
        cwd: Option<&str>,
        cd_first: bool,
        initial_cwd: &str,
        command: String,
    ) -> Result<CallToolResult, McpError> {
        let session = match self
            .sessions
            .show(role, initial_cwd, cwd.map(Path::new))
            .await
        {
            Ok(session) => session,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error showing terminal: {e}"
                ))]));
            }
        };

        if cd_first {
            if let Some(dir) = cwd {
                if let Err(e) = self
                    .sessions
                    .move_to_working_directory(&session, Path::new(dir))
                    .await
                {
                    return Ok(CallToolResult::error(vec![Content::text(format!(
                        "Error changing directory: {e}"
                    ))]));
                }
            }
        }

        if let Err(e) = self.sessions.send_text(&session, &command).await {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Error sending command: {e}"
            ))]));
        }

        Ok(structured_output(&LaunchOutput {
            session: session.name,
            command,
        }))
    }

    #[tool(
        name = "pick-file",
        description = "Open the fuzzy file picker in the primary picker terminal. The selected file is opened in the editor. Returns JSON: { session, command }."
    )]
    async fn pick_file(&self, input: Parameters<PickInput>) -> Result<CallToolResult, McpError> {
        let snapshot = settings::snapshot(&self.settings);
        let command = pipeline::open_file_command(
            &snapshot.picker,
            &self.pipe_script(&snapshot),
            &self.channel_address,
        );
        self.launch(
            TerminalRole::Primary,
            input.0.cwd.as_deref(),
            false,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "pick-file-cwd",
        description = "Open the fuzzy file picker in the cwd-scoped terminal, cd'd to the active document's directory first. Returns JSON: { session, command }."
    )]
    async fn pick_file_cwd(
        &self,
        input: Parameters<PickInput>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = settings::snapshot(&self.settings);
        let command = pipeline::open_file_command(
            &snapshot.picker,
            &self.pipe_script(&snapshot),
            &self.channel_address,
        );
        self.launch(
            TerminalRole::CwdScoped,
            input.0.cwd.as_deref(),
            true,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "pick-file-project-root",
        description = "Open the fuzzy file picker at the git toplevel of the active document's repository. Returns JSON: { session, command }."
    )]
    async fn pick_file_project_root(
        &self,
        input: Parameters<PickInput>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = settings::snapshot(&self.settings);
        let command = pipeline::with_project_root(&pipeline::open_file_command(
            &snapshot.picker,
            &self.pipe_script(&snapshot),
            &self.channel_address,
        ));
        self.launch(
            TerminalRole::Primary,
            input.0.cwd.as_deref(),
            true,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "add-workspace-folder",
        description = "Pick a directory with the fuzzy picker and add it to the editor's workspace. Returns JSON: { session, command }."
    )]
    async fn add_workspace_folder(
        &self,
        input: Parameters<PickInput>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = settings::snapshot(&self.settings);
        let command = pipeline::add_folder_command(
            &snapshot.picker,
            &self.pipe_script(&snapshot),
            &self.channel_address,
        );
        self.launch(
            TerminalRole::Primary,
            input.0.cwd.as_deref(),
            false,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "add-workspace-folder-cwd",
        description = "Pick a directory under the active document's directory and add it to the editor's workspace. Returns JSON: { session, command }."
    )]
    async fn add_workspace_folder_cwd(
        &self,
        input: Parameters<PickInput>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = settings::snapshot(&self.settings);
        let command = pipeline::add_folder_command(
            &snapshot.picker,
            &self.pipe_script(&snapshot),
            &self.channel_address,
        );
        self.launch(
            TerminalRole::CwdScoped,
            input.0.cwd.as_deref(),
            true,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "search",
        description = "Search file contents with ripgrep, filter the matches with the fuzzy picker, and jump to the selected match in the editor. Returns JSON: { session, command }."
    )]
    async fn search(&self, input: Parameters<SearchInput>) -> Result<CallToolResult, McpError> {
        let Some((snapshot, command)) = self.search_pipeline(&input.0) else {
            return Ok(CallToolResult::error(vec![Content::text(
                "pattern is required".to_string(),
            )]));
        };
        self.launch(
            TerminalRole::Primary,
            input.0.cwd.as_deref(),
            false,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "search-cwd",
        description = "Search file contents under the active document's directory and jump to the selected match. Returns JSON: { session, command }."
    )]
    async fn search_cwd(
        &self,
        input: Parameters<SearchInput>,
    ) -> Result<CallToolResult, McpError> {
        let Some((snapshot, command)) = self.search_pipeline(&input.0) else {
            return Ok(CallToolResult::error(vec![Content::text(
                "pattern is required".to_string(),
            )]));
        };
        self.launch(
            TerminalRole::CwdScoped,
            input.0.cwd.as_deref(),
            true,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    #[tool(
        name = "search-project-root",
        description = "Search file contents from the git toplevel of the active document's repository and jump to the selected match. Returns JSON: { session, command }."
    )]
    async fn search_project_root(
        &self,
        input: Parameters<SearchInput>,
    ) -> Result<CallToolResult, McpError> {
        let Some((snapshot, command)) = self.search_pipeline(&input.0) else {
            return Ok(CallToolResult::error(vec![Content::text(
                "pattern is required".to_string(),
            )]));
        };
        let command = pipeline::with_project_root(&command);
        self.launch(
            TerminalRole::CwdScoped,
            input.0.cwd.as_deref(),
            true,
            &snapshot.picker.initial_working_directory,
            command,
        )
        .await
    }

    fn search_pipeline(&self, input: &SearchInput) -> Option<(Settings, String)> {
        if input.pattern.trim().is_empty() {
            return None;
        }
        let snapshot = settings::snapshot(&self.settings);
        let command = pipeline::search_command(
            &input.pattern,
            &snapshot.picker,
            &self.pipe_script(&snapshot),
            &self.channel_address,
        );
        Some((snapshot, command))
    }
}

// ============================================================================
// ServerHandler Implementation
// ============================================================================

#[rmcp::tool_handler]
impl rmcp::ServerHandler for FzfMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Fuzzy picker server: each tool opens fzf (optionally fed by fd or ripgrep) in a tmux session; the user's selection is relayed back and opened in the editor. Pass the active document's directory as cwd so cwd-scoped tools land in the right place.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
