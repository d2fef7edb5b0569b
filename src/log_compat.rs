//! Compatibility bridge for the Rust `log` crate.
//!
//! [`LogstashLogger`] implements `log::Log` and forwards every enabled record
//! into a [`LogHook`], so code using the `log` macros ships its output to
//! Logstash without knowing about the hook.

use std::{sync::Arc, time::Duration};

use log::{LevelFilter, Metadata, Record, SetLoggerError};

use crate::{
    diagnostics::DIAGNOSTICS_TARGET,
    handler::LogHook,
    level::Level,
    log_record::LogRecord,
};

/// Default time `log::logger().flush()` waits for the hook to drain.
pub const DEFAULT_BRIDGE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Adapter implementing the Rust `log::Log` trait on top of a hook.
pub struct LogstashLogger {
    hook: Arc<dyn LogHook>,
    max_level: LevelFilter,
    flush_timeout: Duration,
}

impl LogstashLogger {
    pub fn new(hook: Arc<dyn LogHook>) -> Self {
        Self {
            hook,
            max_level: LevelFilter::Trace,
            flush_timeout: DEFAULT_BRIDGE_FLUSH_TIMEOUT,
        }
    }

    /// Ignore records more verbose than `level`.
    pub fn with_max_level(mut self, level: LevelFilter) -> Self {
        self.max_level = level;
        self
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Install the bridge as the global `log` logger.
    ///
    /// Fails when another global logger has already been set.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }

    fn accepts(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
            && !metadata.target().starts_with(DIAGNOSTICS_TARGET)
            && self
                .hook
                .levels()
                .contains(&Level::from(metadata.level()))
    }
}

/// Convert a `log` record into a hook record carrying its source location.
pub fn to_record(record: &Record<'_>) -> LogRecord {
    let mut converted = LogRecord::new(Level::from(record.level()), record.args().to_string())
        .with_field("target", record.target());
    if let Some(module_path) = record.module_path() {
        converted = converted.with_field("module_path", module_path);
    }
    if let Some(file) = record.file() {
        converted = converted.with_field("file", file);
    }
    if let Some(line) = record.line() {
        converted = converted.with_field("line", line);
    }
    converted
}

impl log::Log for LogstashLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.accepts(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if self.accepts(record.metadata()) {
            self.hook.fire(to_record(record));
        }
    }

    fn flush(&self) {
        // `log::Log::flush` cannot report failure; a timeout just returns.
        let _ = self.hook.flush(self.flush_timeout);
    }
}

impl std::fmt::Debug for LogstashLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogstashLogger")
            .field("max_level", &self.max_level)
            .field("flush_timeout", &self.flush_timeout)
            .finish_non_exhaustive()
    }
}
