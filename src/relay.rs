//! The relay channel the picker pipelines write back to.
//!
//! The channel owns one platform endpoint per process: a filesystem FIFO on
//! Unix, a named pipe server on Windows. The relay script at the end of each
//! pipeline writes a single `command$$workingDirectory$$argument` line to it;
//! the listener decodes lines into [`RelayMessage`]s and hands them to the
//! dispatcher. Malformed lines are dropped without ceremony.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::errors::{Error, Result};
use crate::types::{RelayCommand, RelayMessage};

/// Field separator of the relay wire format.
pub const MESSAGE_DELIMITER: &str = "$$";

/// Candidate addresses tried before channel setup fails.
const MAX_ADDRESS_ATTEMPTS: u32 = 10;

/// Decode one relay line.
///
/// Returns `None` for anything that should be silently dropped: fewer than
/// three fields, an unknown command, or an empty argument (the user closed
/// the picker without selecting).
pub fn parse_line(line: &str) -> Option<RelayMessage> {
    let parts: Vec<&str> = line.trim().split(MESSAGE_DELIMITER).collect();
    if parts.len() < 3 {
        return None;
    }

    let command = RelayCommand::from_wire(parts[0].trim())?;
    let working_directory = PathBuf::from(parts[1].trim());
    let argument = parts[2].trim();
    if argument.is_empty() {
        return None;
    }

    Some(RelayMessage {
        command,
        working_directory,
        argument: argument.to_string(),
    })
}

/// The process-wide relay endpoint.
///
/// One facade over both platform backends: `open()` binds the endpoint and
/// starts the listener, `recv()` yields decoded messages, `close()` tears
/// the endpoint down (unlinking the FIFO on Unix). At most one channel
/// exists per process and its address is stable once established.
pub struct RelayChannel {
    address: String,
    #[cfg(unix)]
    path: Option<PathBuf>,
    #[cfg(unix)]
    closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
    rx: mpsc::UnboundedReceiver<RelayMessage>,
}

impl RelayChannel {
    /// Bind the platform endpoint and start listening.
    ///
    /// The address is derived from the process id; on collision the next
    /// numeric suffix is tried, up to [`MAX_ADDRESS_ATTEMPTS`]. Exhaustion
    /// and any non-collision bind error are fatal.
    #[cfg(unix)]
    pub fn open() -> Result<Self> {
        Self::open_in(&std::env::temp_dir(), std::process::id())
    }

    /// Bind a FIFO under `dir` for process `pid`. Split out so tests can
    /// pick the directory.
    #[cfg(unix)]
    pub fn open_in(dir: &std::path::Path, pid: u32) -> Result<Self> {
        let path = create_fifo(dir, pid)?;
        let address = path.display().to_string();
        tracing::info!(address = %address, "relay channel listening");

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader_path = path.clone();
        let reader_closed = closed.clone();
        // A plain thread, not a runtime blocking task: the reader parks in
        // open() between writers and must not stall runtime shutdown.
        std::thread::Builder::new()
            .name("relay-fifo-reader".to_string())
            .spawn(move || fifo_reader_loop(reader_path, reader_closed, tx))
            .map_err(|e| Error::Channel {
                message: format!("failed to spawn relay reader: {e}"),
            })?;

        Ok(Self {
            address,
            path: Some(path),
            closed,
            rx,
        })
    }

    #[cfg(windows)]
    pub fn open() -> Result<Self> {
        let (address, server) = windows_pipe::bind(std::process::id())?;
        tracing::info!(address = %address, "relay channel listening");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(windows_pipe::serve(address.clone(), server, tx));

        Ok(Self { address, rx })
    }

    /// The stable address pipelines pass to the relay script.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Next decoded message; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<RelayMessage> {
        self.rx.recv().await
    }

    /// Tear the endpoint down. On Unix the FIFO file is removed so no
    /// stale pipe outlives the process; Windows pipes are reclaimed by the
    /// OS. Idempotent.
    pub fn close(&mut self) {
        #[cfg(unix)]
        if let Some(path) = self.path.take() {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
            // Best-effort wake for a reader parked in open(): connect a
            // throwaway writer so it observes EOF, notices the closed
            // flag, and exits.
            {
                use std::os::unix::fs::OpenOptionsExt;
                let _ = std::fs::OpenOptions::new()
                    .write(true)
                    .custom_flags(nix::libc::O_NONBLOCK)
                    .open(&path);
            }
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove relay fifo");
            }
        }
        self.rx.close();
    }
}

impl Drop for RelayChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Create the channel FIFO, retrying with numeric suffixes on collision.
#[cfg(unix)]
fn create_fifo(dir: &std::path::Path, pid: u32) -> Result<PathBuf> {
    use nix::sys::stat::Mode;

    for attempt in 0..MAX_ADDRESS_ATTEMPTS {
        let name = if attempt == 0 {
            format!("fzf-pipe-{pid}")
        } else {
            format!("fzf-pipe-{pid}-{attempt}")
        };
        let path = dir.join(name);

        match nix::unistd::mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR) {
            Ok(()) => return Ok(path),
            Err(nix::errno::Errno::EEXIST) => {
                tracing::debug!(path = %path.display(), "relay address in use, trying next suffix");
            }
            Err(errno) => {
                return Err(Error::Channel {
                    message: format!("failed to create fifo {}: {errno}", path.display()),
                });
            }
        }
    }

    Err(Error::Channel {
        message: format!("no free relay address after {MAX_ADDRESS_ATTEMPTS} attempts"),
    })
}

/// Reader states: a FIFO delivers EOF whenever its current writer closes,
/// so the listener re-arms by reopening.
#[cfg(unix)]
enum FifoState {
    /// Waiting for the next writer; the open() call parks until one
    /// connects.
    Reopening,
    /// A writer is connected; lines are read until EOF.
    Listening(std::io::BufReader<std::fs::File>),
}

/// Runs for the life of the process: Reopening ⇄ Listening until the FIFO
/// is unlinked or the receiving side goes away.
#[cfg(unix)]
fn fifo_reader_loop(
    path: PathBuf,
    closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
    tx: mpsc::UnboundedSender<RelayMessage>,
) {
    use std::io::BufRead;

    let mut state = FifoState::Reopening;
    loop {
        if closed.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        state = match state {
            FifoState::Reopening => match std::fs::File::open(&path) {
                Ok(file) => FifoState::Listening(std::io::BufReader::new(file)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // close() removed the FIFO; we are done.
                    return;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "relay fifo reopen failed");
                    return;
                }
            },
            FifoState::Listening(mut reader) => {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => FifoState::Reopening,
                    Ok(_) => {
                        match parse_line(&line) {
                            Some(message) => {
                                if tx.send(message).is_err() {
                                    return;
                                }
                            }
                            None => {
                                tracing::trace!(line = %line.trim(), "dropping malformed relay line");
                            }
                        }
                        FifoState::Listening(reader)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "relay read failed");
                        FifoState::Reopening
                    }
                }
            }
        };
    }
}

#[cfg(windows)]
mod windows_pipe {
    use tokio::io::AsyncBufReadExt;
    use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};
    use tokio::sync::mpsc;

    use super::{parse_line, MAX_ADDRESS_ATTEMPTS};
    use crate::errors::{Error, Result};
    use crate::types::RelayMessage;

    /// Bind the first free `\\?\pipe\fzf-pipe-<pid>[-<n>]` address.
    pub(super) fn bind(pid: u32) -> Result<(String, NamedPipeServer)> {
        for attempt in 0..MAX_ADDRESS_ATTEMPTS {
            let address = if attempt == 0 {
                format!(r"\\?\pipe\fzf-pipe-{pid}")
            } else {
                format!(r"\\?\pipe\fzf-pipe-{pid}-{attempt}")
            };

            match ServerOptions::new()
                .first_pipe_instance(true)
                .create(&address)
            {
                Ok(server) => return Ok((address, server)),
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    tracing::debug!(address = %address, "relay address in use, trying next suffix");
                }
                Err(e) => {
                    return Err(Error::Channel {
                        message: format!("failed to bind named pipe {address}: {e}"),
                    });
                }
            }
        }

        Err(Error::Channel {
            message: format!("no free relay address after {MAX_ADDRESS_ATTEMPTS} attempts"),
        })
    }

    /// Accept one client at a time and read its lines; each disconnect is
    /// followed by a fresh server instance on the same address.
    pub(super) async fn serve(
        address: String,
        mut server: NamedPipeServer,
        tx: mpsc::UnboundedSender<RelayMessage>,
    ) {
        loop {
            if let Err(e) = server.connect().await {
                tracing::warn!(address = %address, error = %e, "relay pipe accept failed");
                return;
            }

            let connected = server;
            server = match ServerOptions::new().create(&address) {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "relay pipe rebind failed");
                    return;
                }
            };

            let mut lines = tokio::io::BufReader::new(connected).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_line(&line) {
                    Some(message) => {
                        if tx.send(message).is_err() {
                            return;
                        }
                    }
                    None => {
                        tracing::trace!(line = %line.trim(), "dropping malformed relay line");
                    }
                }
            }
        }
    }
}
