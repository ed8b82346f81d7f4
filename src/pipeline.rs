//! Shell pipeline assembly for the picker terminals.
//!
//! Everything here is pure string composition; nothing is executed. Each
//! builder produces the full command line a terminal runs: a producer
//! (fzf, fd, ripgrep) piped into the fuzzy filter, piped into the relay
//! script that writes the selection back to the channel address.

use std::path::Path;

use crate::settings::PickerConfig;

#[cfg(not(windows))]
const PROJECT_ROOT_PREFIX: &str = "cd $(git rev-parse --show-toplevel)";
#[cfg(windows)]
const PROJECT_ROOT_PREFIX: &str =
    "for /f %a in ('git rev-parse --show-toplevel') do cd %a";

/// Pipeline that picks a file and relays it as an `open` message.
pub fn open_file_command(picker: &PickerConfig, script: &Path, address: &str) -> String {
    format!(
        "{} | {} open {}",
        picker.fuzzy_cmd,
        relay_path(picker, &script.display().to_string()),
        relay_path(picker, address),
    )
}

/// Pipeline that picks a directory and relays it as an `add` message.
pub fn add_folder_command(picker: &PickerConfig, script: &Path, address: &str) -> String {
    format!(
        "{} | {} | {} add {}",
        picker.find_directories_cmd,
        picker.fuzzy_cmd,
        relay_path(picker, &script.display().to_string()),
        relay_path(picker, address),
    )
}

/// Pipeline that greps for `pattern`, filters the matches, and relays the
/// chosen one as an `rg` message carrying `file:line:column`.
pub fn search_command(
    pattern: &str,
    picker: &PickerConfig,
    script: &Path,
    address: &str,
) -> String {
    format!(
        "rg {} {} --vimgrep --color ansi | {} | {} rg \"{}\"",
        picker.quote_style.quote(pattern),
        search_flags(picker),
        picker.fuzzy_search_cmd,
        relay_path(picker, &script.display().to_string()),
        relay_path(picker, address),
    )
}

/// Prefix `command` with a `cd` to the repository's git toplevel.
pub fn with_project_root(command: &str) -> String {
    format!("{PROJECT_ROOT_PREFIX} && {command}")
}

/// The ripgrep flag block: the case-style flag followed by any extra flags,
/// verbatim.
fn search_flags(picker: &PickerConfig) -> String {
    let mut flags = picker.search_style.flag().to_string();
    if !picker.search_flags.is_empty() {
        flags.push(' ');
        flags.push_str(&picker.search_flags);
    }
    flags
}

/// Render a script or address path for interpolation into the pipeline.
/// Shells other than cmd.exe on Windows eat single backslashes.
fn relay_path(picker: &PickerConfig, path: &str) -> String {
    if picker.escape_backslashes {
        path.replace('\\', "\\\\")
    } else {
        path.to_string()
    }
}
