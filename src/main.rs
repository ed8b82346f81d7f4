mod dispatch;
mod errors;
mod pipeline;
mod relay;
mod server;
mod settings;
mod terminal;
#[cfg(test)]
mod test_support;
mod types;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rmcp::ServiceExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::dispatch::ActionDispatcher;
use crate::relay::RelayChannel;
use crate::server::FzfMcpServer;
use crate::settings::Settings;
use crate::terminal::SessionManager;

const DEFAULT_PIPE_SCRIPT: &str = if cfg!(windows) {
    "scripts/topipe.bat"
} else {
    "scripts/topipe.sh"
};

#[derive(Parser, Debug)]
#[command(name = "fzf-mcp-rs")]
#[command(about = "Fuzzy picker MCP server: fzf and ripgrep in tmux, selections relayed to the editor")]
#[command(version)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Path to tmux socket (for isolation or connecting to a specific server)
    #[arg(short = 's', long = "socket")]
    socket: Option<PathBuf>,

    /// Editor CLI used to open selections (overrides the [editor] command)
    #[arg(short = 'e', long = "editor")]
    editor: Option<String>,

    /// Relay script invoked at the end of each pipeline
    #[arg(long = "pipe-script", default_value = DEFAULT_PIPE_SCRIPT)]
    pipe_script: PathBuf,
}

fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

/// Drain the relay channel into the dispatcher for the life of the process.
async fn run_relay(channel: &mut RelayChannel, dispatcher: &ActionDispatcher) {
    while let Some(message) = channel.recv().await {
        if let Err(e) = dispatcher.dispatch(message).await {
            tracing::warn!(error = %e, "editor action failed");
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(socket) = &cli.socket {
        std::env::set_var("FZF_MCP_SOCKET", socket);
    }

    init_tracing();

    let mut loaded = match &cli.config {
        Some(path) => match Settings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Error loading config: {e}");
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };

    if let Some(editor) = cli.editor {
        loaded.editor.command = editor;
    }

    let socket = loaded.terminal.socket.clone();
    let settings = settings::shared(loaded);

    if let Some(path) = cli.config.clone() {
        if let Err(e) = settings::spawn_watcher(path, settings.clone()) {
            tracing::warn!(error = %e, "config watcher unavailable");
        }
    }

    let mut channel = match RelayChannel::open() {
        Ok(channel) => channel,
        Err(e) => {
            eprintln!("Failed to open relay channel: {e}");
            std::process::exit(1);
        }
    };

    let dispatcher = ActionDispatcher::new(settings.clone());
    let sessions = Arc::new(SessionManager::new(socket));
    let server = FzfMcpServer::new(
        settings,
        sessions,
        channel.address().to_string(),
        cli.pipe_script,
    );

    tracing::info!("Starting fzf-mcp-rs server with stdio transport");

    let transport = rmcp::transport::io::stdio();

    match server.serve(transport).await {
        Ok(service) => {
            let cancel_token = service.cancellation_token();
            let mut wait = Box::pin(service.waiting());

            tokio::select! {
                result = &mut wait => {
                    if let Err(e) = result {
                        eprintln!("Server error: {e}");
                        channel.close();
                        std::process::exit(1);
                    }
                }
                _ = shutdown_signal() => {
                    cancel_token.cancel();
                    if let Err(e) = wait.await {
                        eprintln!("Server error: {e}");
                        channel.close();
                        std::process::exit(1);
                    }
                }
                _ = run_relay(&mut channel, &dispatcher) => {}
            }
            channel.close();
        }
        Err(e) => {
            channel.close();
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_pipe_script_matches_platform() {
        #[cfg(unix)]
        assert_eq!(super::DEFAULT_PIPE_SCRIPT, "scripts/topipe.sh");
        #[cfg(windows)]
        assert_eq!(super::DEFAULT_PIPE_SCRIPT, "scripts/topipe.bat");
    }
}
