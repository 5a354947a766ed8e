//! Session logger for PhotoMark.
//!
//! Every run truncates `photomark.log` in the platform data directory, so the
//! file only ever holds the latest session. Until `init` is called the macros
//! are no-ops, which keeps the library quiet when embedded (and in tests).
//!
//! Log location:
//!   Windows:  `%APPDATA%\PhotoMark\photomark.log`
//!   Linux:    `~/.local/share/PhotoMark/photomark.log`
//!   macOS:    `~/Library/Application Support/PhotoMark/photomark.log`

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static ECHO_STDERR: AtomicBool = AtomicBool::new(false);

/// Path of the current session log, once `init` succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Mirror every log line to stderr as well (CLI `--verbose`).
pub fn set_verbose(on: bool) {
    ECHO_STDERR.store(on, Ordering::Relaxed);
}

/// Append a raw line. I/O errors are swallowed.
pub fn write_line(line: &str) {
    if ECHO_STDERR.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Append a `[time] [LEVEL] message` line.
pub fn write(level: &str, msg: &str) {
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*))
    };
}

/// Open the default session log and install the panic hook.
pub fn init() {
    init_at(&default_log_path());
}

/// Open (truncating) the session log at `path` and install the panic hook.
/// Only the first successful call has any effect.
pub fn init_at(path: &Path) {
    if LOG_FILE.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.to_path_buf());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!("=== PhotoMark session started {} ===", session_stamp()));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

fn default_log_path() -> PathBuf {
    data_dir().join("PhotoMark").join("photomark.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// `HH:MM:SS` (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn session_stamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}
