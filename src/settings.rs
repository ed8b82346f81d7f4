//! Configuration schema and reloading.
//!
//! Settings come from an optional TOML file; every key has a default so an
//! absent file yields a working configuration. A notify-based watcher
//! refreshes the shared snapshot when the file changes, so the next tool
//! invocation sees the new values.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{recommended_watcher, RecursiveMode, Watcher};
use serde::Deserialize;

use crate::errors::{Error, Result};

/// How ripgrep treats case in content searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStyle {
    #[default]
    CaseSensitive,
    IgnoreCase,
    SmartCase,
}

impl SearchStyle {
    /// The ripgrep flag selecting this style.
    pub fn flag(self) -> &'static str {
        match self {
            SearchStyle::CaseSensitive => "--case-sensitive",
            SearchStyle::IgnoreCase => "--ignore-case",
            SearchStyle::SmartCase => "--smart-case",
        }
    }
}

/// Quote character used when interpolating the search pattern into the
/// shell pipeline. cmd.exe does not support single quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    #[default]
    Single,
    Double,
}

impl QuoteStyle {
    /// Wrap `raw` in this quote style, escaping embedded quote characters.
    pub fn quote(self, raw: &str) -> String {
        match self {
            QuoteStyle::Single => format!("'{}'", raw.replace('\'', r"'\''")),
            QuoteStyle::Double => format!("\"{}\"", raw.replace('"', "\\\"")),
        }
    }
}

/// Picker commands and search behavior, `[picker]` in config.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "default_fuzzy_cmd")]
    pub fuzzy_cmd: String,
    #[serde(default = "default_fuzzy_cmd")]
    pub fuzzy_search_cmd: String,
    #[serde(default = "default_find_directories_cmd")]
    pub find_directories_cmd: String,
    #[serde(default)]
    pub initial_working_directory: String,
    #[serde(default)]
    pub search_style: SearchStyle,
    #[serde(default)]
    pub search_flags: String,
    #[serde(default)]
    pub quote_style: QuoteStyle,
    #[serde(default)]
    pub escape_backslashes: bool,
    #[serde(default)]
    pub pipe_script: Option<PathBuf>,
}

fn default_fuzzy_cmd() -> String {
    "fzf".to_string()
}

fn default_find_directories_cmd() -> String {
    "fd --type directory".to_string()
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            fuzzy_cmd: default_fuzzy_cmd(),
            fuzzy_search_cmd: default_fuzzy_cmd(),
            find_directories_cmd: default_find_directories_cmd(),
            initial_working_directory: String::new(),
            search_style: SearchStyle::default(),
            search_flags: String::new(),
            quote_style: QuoteStyle::default(),
            escape_backslashes: false,
            pipe_script: None,
        }
    }
}

/// Terminal backend configuration, `[terminal]` in config.toml.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TerminalConfig {
    #[serde(default)]
    pub socket: Option<String>,
}

/// Editor CLI configuration, `[editor]` in config.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_editor_command")]
    pub command: String,
    #[serde(default = "default_goto_flag")]
    pub goto_flag: String,
    #[serde(default = "default_add_flag")]
    pub add_flag: String,
}

fn default_editor_command() -> String {
    "code".to_string()
}

fn default_goto_flag() -> String {
    "-g".to_string()
}

fn default_add_flag() -> String {
    "--add".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: default_editor_command(),
            goto_flag: default_goto_flag(),
            add_flag: default_add_flag(),
        }
    }
}

/// Root configuration file schema for config.toml.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub picker: PickerConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub editor: EditorConfig,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file: {e}"),
        })?;

        toml::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse config file: {e}"),
        })
    }
}

/// Shared, reloadable settings snapshot.
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Wrap settings for shared access across tool handlers and the watcher.
pub fn shared(settings: Settings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Clone the current snapshot.
pub fn snapshot(settings: &SharedSettings) -> Settings {
    settings
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Re-read the config file into the shared snapshot. Keeps the previous
/// snapshot when the file is unreadable or malformed.
pub fn reload(path: &Path, settings: &SharedSettings) {
    match Settings::load(path) {
        Ok(fresh) => {
            let mut guard = settings.write().unwrap_or_else(|e| e.into_inner());
            *guard = fresh;
            tracing::info!(path = %path.display(), "configuration reloaded");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "configuration reload failed, keeping previous settings");
        }
    }
}

/// Watch the config file and reload the shared snapshot on change.
///
/// Events are debounced: after the first relevant event the watcher sleeps
/// briefly and drains whatever else arrived, then reloads once.
pub fn spawn_watcher(path: PathBuf, settings: SharedSettings) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .map_err(|e| Error::Config {
        message: format!("failed to create config watcher: {e}"),
    })?;

    let watch_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| Error::Config {
            message: format!("failed to watch config directory: {e}"),
        })?;

    let file_name = path.file_name().map(|n| n.to_os_string());
    std::thread::spawn(move || {
        // Owned by the thread so the watch outlives this function.
        let _watcher = watcher;

        while let Ok(event) = rx.recv() {
            if !is_config_event(&event, file_name.as_deref()) {
                continue;
            }

            std::thread::sleep(Duration::from_millis(200));
            while let Ok(pending) = rx.try_recv() {
                drop(pending);
            }

            reload(&path, &settings);
        }
    });

    Ok(())
}

fn is_config_event(
    event: &notify::Result<notify::Event>,
    file_name: Option<&std::ffi::OsStr>,
) -> bool {
    let event = match event {
        Ok(event) => event,
        Err(_) => return false,
    };

    let relevant_kind = matches!(
        event.kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
    );
    if !relevant_kind {
        return false;
    }

    match file_name {
        Some(name) => event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(name)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case(SearchStyle::CaseSensitive, "--case-sensitive")]
    #[case(SearchStyle::IgnoreCase, "--ignore-case")]
    #[case(SearchStyle::SmartCase, "--smart-case")]
    fn search_style_maps_to_flag(#[case] style: SearchStyle, #[case] expected: &str) {
        assert_eq!(style.flag(), expected);
    }

    #[rstest]
    #[case(QuoteStyle::Single, "plain", "'plain'")]
    #[case(QuoteStyle::Single, "it's", r"'it'\''s'")]
    #[case(QuoteStyle::Double, "plain", "\"plain\"")]
    #[case(QuoteStyle::Double, "say \"hi\"", "\"say \\\"hi\\\"\"")]
    fn quote_style_escapes_embedded_quotes(
        #[case] style: QuoteStyle,
        #[case] raw: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(style.quote(raw), expected);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let settings: Settings = toml::from_str("").expect("parse empty config");
        assert_eq!(settings.picker.fuzzy_cmd, "fzf");
        assert_eq!(settings.picker.fuzzy_search_cmd, "fzf");
        assert_eq!(settings.picker.find_directories_cmd, "fd --type directory");
        assert_eq!(settings.picker.search_style, SearchStyle::CaseSensitive);
        assert_eq!(settings.picker.quote_style, QuoteStyle::Single);
        assert!(settings.picker.search_flags.is_empty());
        assert!(settings.terminal.socket.is_none());
        assert_eq!(settings.editor.command, "code");
        assert_eq!(settings.editor.goto_flag, "-g");
        assert_eq!(settings.editor.add_flag, "--add");
    }

    #[test]
    fn full_config_overrides_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [picker]
            fuzzy_cmd = "fzf --height 40%"
            fuzzy_search_cmd = "sk"
            find_directories_cmd = "find . -type d"
            initial_working_directory = "/srv/project"
            search_style = "smart-case"
            search_flags = "--hidden -g '!target'"
            quote_style = "double"
            escape_backslashes = true

            [terminal]
            socket = "/tmp/picker.sock"

            [editor]
            command = "codium"
            "#,
        )
        .expect("parse full config");

        assert_eq!(settings.picker.fuzzy_cmd, "fzf --height 40%");
        assert_eq!(settings.picker.fuzzy_search_cmd, "sk");
        assert_eq!(settings.picker.find_directories_cmd, "find . -type d");
        assert_eq!(settings.picker.initial_working_directory, "/srv/project");
        assert_eq!(settings.picker.search_style, SearchStyle::SmartCase);
        assert_eq!(settings.picker.search_flags, "--hidden -g '!target'");
        assert_eq!(settings.picker.quote_style, QuoteStyle::Double);
        assert!(settings.picker.escape_backslashes);
        assert_eq!(settings.terminal.socket.as_deref(), Some("/tmp/picker.sock"));
        assert_eq!(settings.editor.command, "codium");
        assert_eq!(settings.editor.goto_flag, "-g");
    }

    #[test]
    fn load_missing_file_returns_error() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("missing.toml");

        let err = Settings::load(&missing).unwrap_err();
        assert!(matches!(
            err,
            Error::Config { message } if message.contains("failed to read config file")
        ));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").expect("write invalid toml");

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Config { message } if message.contains("failed to parse config file")
        ));
    }

    #[test]
    fn reload_replaces_snapshot() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[picker]\nfuzzy_cmd = \"sk\"\n").expect("write config");

        let settings = shared(Settings::default());
        reload(&path, &settings);

        assert_eq!(snapshot(&settings).picker.fuzzy_cmd, "sk");
    }

    #[test]
    fn reload_keeps_snapshot_on_parse_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").expect("write invalid toml");

        let settings = shared(Settings::default());
        reload(&path, &settings);

        assert_eq!(snapshot(&settings).picker.fuzzy_cmd, "fzf");
    }
}
