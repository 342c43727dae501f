//! Run log for ThumbCraft.
//!
//! Each run replaces the previous log, at `<data dir>/ThumbCraft/thumbcraft.log`
//! where the data dir is `%APPDATA%` on Windows, `~/Library/Application Support`
//! on macOS and `$XDG_DATA_HOME` (or `~/.local/share`) elsewhere.
//!
//! Lines are written through `log_info!`, `log_warn!` and `log_err!`. Until
//! [`init`] has run (unit tests, library callers) the macros write nothing.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
    echo: bool,
}

static RUN_LOG: OnceLock<RunLog> = OnceLock::new();

/// Location of the active log file, once [`init`] succeeded.
pub fn log_path() -> Option<&'static Path> {
    RUN_LOG.get().map(|log| log.path.as_path())
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::record($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Append one entry. Write failures are dropped.
pub fn record(level: Level, msg: &str) {
    let Some(log) = RUN_LOG.get() else { return };
    let line = format_entry(&clock(), &level.to_string(), msg);
    if log.echo {
        eprintln!("{}", line);
    }
    append(log, &line);
}

fn append(log: &RunLog, line: &str) {
    if let Ok(mut file) = log.file.lock() {
        let _ = writeln!(file, "{}", line);
    }
}

fn format_entry(clock: &str, tag: &str, msg: &str) -> String {
    format!("{} {:<5} {}", clock, tag, msg)
}

/// Start the run log at the platform location. With `echo`, entries are
/// mirrored to stderr.
pub fn init(echo: bool) {
    init_at(&data_dir().join("ThumbCraft").join("thumbcraft.log"), echo);
}

/// [`init`] with an explicit file. Only the first call takes effect.
pub fn init_at(path: &Path, echo: bool) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("thumbcraft: log disabled, cannot open {}: {}", path.display(), e);
            return;
        }
    };

    let log = RunLog {
        path: path.to_path_buf(),
        file: Mutex::new(file),
        echo,
    };
    if RUN_LOG.set(log).is_err() {
        return;
    }
    if let Some(log) = RUN_LOG.get() {
        append(log, &format!("# ThumbCraft run, epoch second {}", epoch_secs()));
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(log) = RUN_LOG.get() {
            append(log, &format_entry(&clock(), "PANIC", &info.to_string()));
        }
        previous(info);
    }));
}

fn data_dir() -> PathBuf {
    let env_dir = |key: &str| std::env::var_os(key).map(PathBuf::from);
    #[cfg(target_os = "windows")]
    if let Some(dir) = env_dir("APPDATA") {
        return dir;
    }
    #[cfg(target_os = "macos")]
    if let Some(home) = env_dir("HOME") {
        return home.join("Library/Application Support");
    }
    env_dir("XDG_DATA_HOME")
        .or_else(|| env_dir("HOME").map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// UTC wall clock as `HH:MM:SS.mmm`.
fn clock() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() % 86_400_000)
        .unwrap_or(0);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1000 % 60,
        millis % 1000
    )
}
