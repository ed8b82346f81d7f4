//! Public API surface for the fzf-mcp-rs library.

/// Editor action dispatch for decoded relay messages.
pub mod dispatch;
/// Error types and Result alias for the library.
pub mod errors;
/// Shell pipeline composition for the picker terminals.
pub mod pipeline;
/// The relay channel listener and wire format.
pub mod relay;
/// MCP server and picker tool surface.
pub mod server;
/// Configuration schema, loading, and reloading.
pub mod settings;
/// tmux session management for picker terminals.
pub mod terminal;
/// Shared data types used across the crate.
pub mod types;

#[cfg(test)]
mod test_support;
