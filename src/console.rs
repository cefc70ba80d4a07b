// Trace console: `log` sink for the kernel's scheduling trace
use std::collections::VecDeque;
use std::fmt::Write;

use conquer_once::spin::OnceCell;
use lazy_static::lazy_static;
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Trace lines kept in memory; older ones are dropped first.
pub const HISTORY_LIMIT: usize = 4096;

/// Where trace lines go
pub struct Console {
    echo: bool,
    history: VecDeque<String>,
    keep_history: bool,
}

impl Console {
    pub fn new() -> Self {
        Self {
            echo: true,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
            keep_history: false,
        }
    }

    fn write_line(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        if self.keep_history {
            if self.history.len() == HISTORY_LIMIT {
                self.history.pop_front();
            }
            self.history.push_back(line);
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    pub static ref CONSOLE: Mutex<Console> = Mutex::new(Console::new());
}

static LOGGER: ConsoleLogger = ConsoleLogger;
/// Set by the first `init`: whether the console owns the `log` facade.
static OWNS_FACADE: OnceCell<bool> = OnceCell::uninit();

struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line = String::new();
        let _ = write!(line, "[{:<5}] {}", record.level(), record.args());
        CONSOLE.lock().write_line(line);
    }

    fn flush(&self) {}
}

/// Installs the console as the global logger and sets the level. Later
/// calls only change the level. Returns whether trace lines reach the
/// console, which is false when another logger took the facade first.
pub fn init(level: LevelFilter) -> bool {
    let _ = OWNS_FACADE.try_init_once(|| log::set_logger(&LOGGER).is_ok());
    log::set_max_level(level);
    is_installed()
}

pub fn is_installed() -> bool {
    OWNS_FACADE.try_get().map_or(false, |owns| *owns)
}

/// Turns stdout echo on or off.
pub fn set_echo(echo: bool) {
    CONSOLE.lock().echo = echo;
}

/// Starts or stops keeping trace lines in memory.
pub fn set_history(keep: bool) {
    let mut console = CONSOLE.lock();
    console.keep_history = keep;
    if !keep {
        console.history.clear();
    }
}

/// Drains the lines kept so far.
pub fn take_history() -> Vec<String> {
    CONSOLE.lock().history.drain(..).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_captures_trace_lines() {
        assert!(init(LevelFilter::Info));
        assert!(is_installed());
        set_echo(false);
        set_history(true);
        log::info!("Time {}: Process {} runs", 3, 1);
        log::debug!("filtered out");

        let lines = take_history();
        set_history(false);
        assert!(lines.iter().any(|line| line == "[INFO ] Time 3: Process 1 runs"));
        assert!(!lines.iter().any(|line| line.contains("filtered out")));
    }

    #[test]
    fn history_drops_oldest_lines() {
        let mut console = Console::new();
        console.echo = false;
        console.keep_history = true;
        for n in 0..HISTORY_LIMIT + 2 {
            console.write_line(n.to_string());
        }
        assert_eq!(console.history.len(), HISTORY_LIMIT);
        assert_eq!(console.history.front().map(String::as_str), Some("2"));
    }
}
