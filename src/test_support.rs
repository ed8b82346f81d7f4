use std::env;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const TMUX_STUB_SCRIPT: &str = r#"#!/bin/sh
socket=""
if [ "$1" = "-S" ]; then
  socket="$2"
  shift 2
fi

cmd="$1"
shift

if [ -n "${TMUX_STUB_CMD_LOG:-}" ]; then
  printf '%s %s\n' "$cmd" "$*" >> "$TMUX_STUB_CMD_LOG"
fi

if [ "${TMUX_STUB_FORCE_ERROR:-}" = "1" ] || [ "${TMUX_STUB_ERROR_CMD:-}" = "$cmd" ]; then
  echo "${TMUX_STUB_ERROR_MSG:-stub error}" 1>&2
  exit 1
fi

case "$cmd" in
  list-sessions)
    printf '%b' "${TMUX_STUB_LIST_SESSIONS-\$1\tmain\t1\t1}"
    ;;
  new-session)
    if [ -n "${TMUX_STUB_NEW_SESSION_OUTPUT:-}" ]; then
      printf '%b' "$TMUX_STUB_NEW_SESSION_OUTPUT"
    else
      name=""
      while [ $# -gt 0 ]; do
        if [ "$1" = "-s" ]; then
          name="$2"
          shift 2
        else
          shift
        fi
      done
      printf '$9\t%s\t0\t1' "$name"
    fi
    ;;
  send-keys|switch-client)
    ;;
  *)
    echo "unknown command: $cmd" 1>&2
    exit 1
    ;;
esac
"#;

const EDITOR_STUB_SCRIPT: &str = r#"#!/bin/sh
if [ -n "${EDITOR_STUB_LOG:-}" ]; then
  printf '%s\n' "$*" >> "$EDITOR_STUB_LOG"
fi
if [ "${EDITOR_STUB_FORCE_ERROR:-}" = "1" ]; then
  echo "editor stub error" 1>&2
  exit 1
fi
"#;

/// Puts fake `tmux` and `editor-stub` executables on PATH and records
/// their invocations, restoring the environment on drop.
pub struct CommandStub {
    _lock: MutexGuard<'static, ()>,
    dir: TempDir,
    original_vars: Vec<(String, Option<OsString>)>,
}

impl CommandStub {
    pub fn new() -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().expect("create temp dir");
        write_executable(&dir.path().join("tmux"), TMUX_STUB_SCRIPT);
        write_executable(&dir.path().join("editor-stub"), EDITOR_STUB_SCRIPT);

        let mut stub = Self {
            _lock: lock,
            dir,
            original_vars: Vec::new(),
        };

        let mut path = OsString::new();
        path.push(stub.dir.path());
        path.push(OsStr::new(":"));
        if let Some(existing) = env::var_os("PATH") {
            path.push(existing);
        }
        stub.set_var("PATH", path);

        let cmd_log = stub.dir.path().join("tmux.log");
        stub.set_var("TMUX_STUB_CMD_LOG", &cmd_log);
        let editor_log = stub.dir.path().join("editor.log");
        stub.set_var("EDITOR_STUB_LOG", &editor_log);
        stub.remove_var("FZF_MCP_SOCKET");

        stub
    }

    /// Log of every tmux invocation, one `command args` line each.
    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("tmux.log")
    }

    /// Log of every editor-stub invocation, one argv line each.
    pub fn editor_log_path(&self) -> PathBuf {
        self.dir.path().join("editor.log")
    }

    /// Editor log contents; empty when the editor was never spawned.
    pub fn editor_log(&self) -> String {
        fs::read_to_string(self.editor_log_path()).unwrap_or_default()
    }

    pub fn set_var(&mut self, key: &str, value: impl AsRef<OsStr>) {
        self.record_original(key);
        env::set_var(key, value);
    }

    pub fn remove_var(&mut self, key: &str) {
        self.record_original(key);
        env::remove_var(key);
    }

    fn record_original(&mut self, key: &str) {
        if self.original_vars.iter().any(|(k, _)| k == key) {
            return;
        }
        self.original_vars.push((key.to_string(), env::var_os(key)));
    }
}

impl Drop for CommandStub {
    fn drop(&mut self) {
        for (key, value) in self.original_vars.drain(..) {
            if let Some(value) = value {
                env::set_var(key, value);
            } else {
                env::remove_var(key);
            }
        }
    }
}

fn write_executable(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write stub script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).expect("stat stub").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod stub");
    }
}
