use thiserror::Error;

/// Convenience result type for fzf-mcp-rs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error variants returned by fzf-mcp-rs APIs.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration parsing or IO failure.
    #[error("config error: {message}")]
    Config { message: String },

    /// Relay channel setup or IO failure.
    #[error("channel error: {message}")]
    Channel { message: String },

    /// tmux command execution failed.
    #[error("terminal error: {message}")]
    Terminal { message: String },

    /// Spawning the editor CLI failed.
    #[error("editor error: {message}")]
    Editor { message: String },

    /// Invalid arguments were provided.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}
