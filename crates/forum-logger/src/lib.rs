//! Console and file logging for the forum CLI
//!
//! Library crates log through `tracing`. This crate carries the operator
//! facing side: colored messages gated by verbosity, a run log that records
//! every message with a timestamp, and the spinner shown while mods install.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const LOG_FILE_NAME: &str = "forum.log";

struct State {
    verbosity: u8,
    log_path: Option<PathBuf>,
    spinner: Option<ProgressBar>,
}

static STATE: Mutex<State> = Mutex::new(State {
    verbosity: 0,
    log_path: None,
    spinner: None,
});

fn state() -> Option<MutexGuard<'static, State>> {
    STATE.lock().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Debug,
    Phase,
    Warn,
    Error,
    Success,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Debug => "DEBUG",
            Kind::Phase => "PHASE",
            Kind::Warn => "WARN",
            Kind::Error => "ERROR",
            Kind::Success => "OK",
        }
    }

    /// Lowest verbosity at which the message reaches the console
    fn min_verbosity(self) -> u8 {
        match self {
            Kind::Debug | Kind::Phase => 1,
            Kind::Warn | Kind::Error | Kind::Success => 0,
        }
    }
}

/// Start a run: set the verbosity and truncate the run log in the config
/// directory. Returns the log path.
pub fn init(verbosity: u8) -> Result<PathBuf, String> {
    let dir = default_log_dir().ok_or("Could not determine the config directory")?;
    init_in(verbosity, &dir)
}

/// Like [`init`], with the run log placed in `dir`
pub fn init_in(verbosity: u8, dir: &Path) -> Result<PathBuf, String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    let path = dir.join(LOG_FILE_NAME);
    fs::write(&path, "").map_err(|e| format!("Failed to reset {}: {}", path.display(), e))?;

    let mut state = state().ok_or("Logger state poisoned")?;
    state.verbosity = verbosity;
    state.log_path = Some(path.clone());
    Ok(path)
}

fn default_log_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::config_dir().map(|config| config.join("forum"))
    } else {
        dirs::home_dir().map(|home| home.join(".config").join("forum"))
    }
}

pub fn verbosity() -> u8 {
    state().map_or(0, |state| state.verbosity)
}

/// `tracing` filter directive for the current verbosity
pub fn tracing_filter() -> &'static str {
    match verbosity() {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Path of the run log, once [`init`] succeeded
pub fn log_path() -> Option<PathBuf> {
    state().and_then(|state| state.log_path.clone())
}

fn emit(kind: Kind, message: &str) {
    let Some(state) = state() else {
        return;
    };
    if let Some(path) = &state.log_path {
        if let Ok(mut file) = OpenOptions::new().append(true).open(path) {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "[{}] {:<5} {}", timestamp, kind.label(), message);
        }
    }
    if state.verbosity < kind.min_verbosity() {
        return;
    }

    let line = match kind {
        Kind::Debug => format!("{} {}", "debug:".blue().bold(), message),
        Kind::Phase => format!("{} {}", "==>".cyan().bold(), message),
        Kind::Warn => format!("{} {}", "warning:".yellow().bold(), message),
        Kind::Error => format!("{} {}", "Error:".red().bold(), message),
        Kind::Success => format!("{} {}", "\u{2714}".green().bold(), message),
    };
    match &state.spinner {
        Some(spinner) => spinner.suspend(|| eprintln!("{}", line)),
        None => eprintln!("{}", line),
    }
}

pub fn debug(message: &str) {
    emit(Kind::Debug, message);
}

/// A step of a longer operation (shown with `-v`)
pub fn phase(message: &str) {
    emit(Kind::Phase, message);
}

pub fn warn(message: &str) {
    emit(Kind::Warn, message);
}

pub fn error(message: &str) {
    emit(Kind::Error, message);
}

pub fn success(message: &str) {
    emit(Kind::Success, message);
}

/// Show a spinner until [`spinner_finish`]. Verbose runs print phases
/// instead.
pub fn spinner_start(message: &str) {
    let Some(mut state) = state() else {
        return;
    };
    if state.verbosity > 0 {
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    state.spinner = Some(spinner);
}

/// Clear the spinner and report how the operation ended
pub fn spinner_finish(outcome: Result<&str, &str>) {
    if let Some(spinner) = state().and_then(|mut state| state.spinner.take()) {
        spinner.finish_and_clear();
    }
    match outcome {
        Ok(message) => success(message),
        Err(message) => error(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_reach_console_by_verbosity() {
        assert_eq!(Kind::Warn.min_verbosity(), 0);
        assert_eq!(Kind::Success.min_verbosity(), 0);
        assert_eq!(Kind::Phase.min_verbosity(), 1);
        assert_eq!(Kind::Debug.min_verbosity(), 1);
    }

    #[test]
    fn test_run_log_records_every_message() {
        let tmp = tempfile::TempDir::new().unwrap();
        let stale = tmp.path().join(LOG_FILE_NAME);
        fs::write(&stale, "previous run\n").unwrap();

        let path = init_in(0, tmp.path()).unwrap();
        assert_eq!(path, stale);
        assert_eq!(log_path(), Some(path.clone()));
        assert_eq!(tracing_filter(), "warn");

        debug("hidden on the console");
        phase("Loading configuration");
        spinner_finish(Ok("Installed 2 mods"));
        spinner_finish(Err("icons failed"));

        let log = fs::read_to_string(&path).unwrap();
        assert!(!log.contains("previous run"));
        assert!(log.contains("DEBUG hidden on the console"));
        assert!(log.contains("PHASE Loading configuration"));
        assert!(log.contains("OK    Installed 2 mods"));
        assert!(log.contains("ERROR icons failed"));

        init_in(2, tmp.path()).unwrap();
        assert_eq!(verbosity(), 2);
        assert_eq!(tracing_filter(), "trace");
        init_in(0, tmp.path()).unwrap();
    }
}
