use std::borrow::Cow;

use super::{LogLevel, Logger};

/// Longest line forwarded; longer lines are cut and marked with `...`.
pub const MAX_LINE: usize = 1024;

/// Forwards core and bridge lines to `tracing` under the `retro_host::core` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    level: LogLevel,
}

impl TracingLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }
}

impl Logger for TracingLogger {
    fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&mut self, level: LogLevel, line: &str) {
        if level < self.level { return; }
        let line = clip_line(line);
        match level {
            LogLevel::Debug => tracing::debug!(target: "retro_host::core", "{line}"),
            LogLevel::Info => tracing::info!(target: "retro_host::core", "{line}"),
            LogLevel::Warn => tracing::warn!(target: "retro_host::core", "{line}"),
            LogLevel::Error => tracing::error!(target: "retro_host::core", "{line}"),
        }
    }
}

/// Drops trailing line breaks and caps the line at `MAX_LINE` bytes.
pub fn clip_line(line: &str) -> Cow<'_, str> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.len() <= MAX_LINE { return Cow::Borrowed(line); }

    let mut cut = MAX_LINE - 3;
    while !line.is_char_boundary(cut) { cut -= 1; }
    Cow::Owned(format!("{}...", &line[..cut]))
}
