//! Helpers for turning configured command lines into processes.

use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

/// Build a [Command] that runs `script` with the POSIX shell.
pub fn command_for_script(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

/// Quote `value` so the shell passes it through as a single word.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote a path, see [quote].
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

// leading `sudo [-opts]` and `VAR=value` assignments are not the utility
static COMMAND_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:sudo\s+(?:-\S+\s+)*)?(?:\w+=\S*\s+)*").expect("static regex is valid")
});

/// User facing name of the utility a command line runs.
///
/// `sudo -n /usr/bin/tar -cf - dir` is reported as `tar`.
pub fn command_name(command: &str) -> String {
    let rest = COMMAND_PREFIX.replace(command, "");
    let program = rest.split_whitespace().next().unwrap_or_default();
    program
        .trim_matches(|c| c == '\'' || c == '"')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
