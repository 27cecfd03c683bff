//! Category-based logging shared by every system crate.
//!
//! Each [`LogCategory`] carries its own [`LogLevel`]; a category left at
//! `Off` falls back to the global level. Messages are built lazily, so a
//! disabled category costs one atomic load per call site.
//!
//! Output goes to stderr, or to a file written by a background thread
//! once [`LogConfig::set_log_file`] has been called. A per-category rate
//! limiter keeps a stalled machine (which re-executes the same
//! instruction forever) from flooding the output.
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::CPU, LogLevel::Debug, || {
//!     format!("unhandled opcode {:04X} at {:03X}", 0xE0FF, 0x200)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level `{0}` (expected off, error, warn, info, debug, trace or 0-5)")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "err" | "1" => Ok(LogLevel::Error),
            "warn" | "warning" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl LogLevel {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Emulator subsystem a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Fetch/dispatch, control flow faults
    CPU,
    /// Program loading and host memory writes
    Memory,
    /// Display buffer writes and sprite drawing
    Display,
    /// Delay/sound timers and frame pacing
    Timers,
    /// Key state changes
    Input,
    /// Unimplemented or ignored features
    Stubs,
}

impl LogCategory {
    pub const ALL: [LogCategory; 6] = [
        LogCategory::CPU,
        LogCategory::Memory,
        LogCategory::Display,
        LogCategory::Timers,
        LogCategory::Input,
        LogCategory::Stubs,
    ];

    const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }
}

struct Window {
    stamps: VecDeque<Instant>,
    dropped: usize,
    last_report: Option<Instant>,
}

/// Sliding one-second window per category.
struct RateLimiter {
    max_per_second: AtomicUsize,
    windows: Mutex<Vec<Window>>,
}

impl RateLimiter {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(max_per_second: usize) -> Self {
        let windows = (0..LogCategory::COUNT)
            .map(|_| Window {
                stamps: VecDeque::new(),
                dropped: 0,
                last_report: None,
            })
            .collect();
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            windows: Mutex::new(windows),
        }
    }

    /// Returns whether the message may be written, plus a count of
    /// previously dropped messages that is due to be reported.
    fn admit(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let max = self.max_per_second.load(Ordering::Relaxed);
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let w = &mut windows[category.index()];

        while let Some(&front) = w.stamps.front() {
            if now.duration_since(front) > Self::WINDOW {
                w.stamps.pop_front();
            } else {
                break;
            }
        }

        if w.stamps.len() < max {
            w.stamps.push_back(now);
            if w.dropped > 0 {
                let dropped = std::mem::take(&mut w.dropped);
                w.last_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        w.dropped += 1;
        let due = w
            .last_report
            .map_or(true, |last| now.duration_since(last) >= Self::WINDOW);
        if due {
            w.last_report = Some(now);
            (false, Some(std::mem::take(&mut w.dropped)))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; LogCategory::COUNT],
    file_sink: Mutex<Option<Sender<String>>>,
    file_enabled: AtomicBool,
    limiter: RateLimiter,
}

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            file_sink: Mutex::new(None),
            file_enabled: AtomicBool::new(false),
            limiter: RateLimiter::new(60),
        }
    }

    /// Process-wide instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category with its own level uses it; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.level(category) {
            LogLevel::Off => level <= self.global_level(),
            own => level <= own,
        }
    }

    /// Turn every category and the global level off.
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.limiter
            .max_per_second
            .store(max_per_second, Ordering::Relaxed);
    }

    pub fn rate_limit(&self) -> usize {
        self.limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Append log output to `path` from a background writer thread.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                while let Ok(line) = receiver.recv() {
                    let _ = writeln!(file, "{}", line);
                    let _ = file.flush();
                }
            })?;

        let mut sink = match self.file_sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sink = Some(sender);
        self.file_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop writing to the log file; output returns to stderr.
    pub fn clear_log_file(&self) {
        let mut sink = match self.file_sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *sink = None;
        self.file_enabled.store(false, Ordering::Relaxed);
    }

    fn write_line(&self, line: String) {
        if self.file_enabled.load(Ordering::Relaxed) {
            if let Ok(sink) = self.file_sink.lock() {
                if let Some(sender) = sink.as_ref() {
                    if let Err(failed) = sender.send(line) {
                        eprintln!("{}", failed.0);
                    }
                    return;
                }
            }
        }
        eprintln!("{}", line);
    }
}

/// Log a message for `category` at `level`.
///
/// `message_fn` only runs when the category is enabled at that level and
/// the rate limiter admits the message.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (admitted, dropped) = config.limiter.admit(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_line(format!(
            "[{:?}] rate limit exceeded, {} message(s) dropped",
            category, count
        ));
    }
    if admitted {
        config.write_line(format!("[{:?}] {}", category, message_fn()));
    }
}
