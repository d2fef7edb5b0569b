//! Injected sink for the hook's own diagnostics.
//!
//! The hook reports connection failures and dropped records through the
//! `log` facade. Callers may hand in a dedicated [`log::Log`] implementation;
//! otherwise messages go to whatever global logger is installed.

use std::{fmt, sync::Arc};

use log::{Level, Log, Record};

/// Target attached to every diagnostic emitted by the crate.
pub const DIAGNOSTICS_TARGET: &str = "logstash_hook";

/// Handle used by the hook components to report their own problems.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn Log>>,
}

impl Diagnostics {
    /// Forward diagnostics to the process-wide `log` logger.
    pub fn global() -> Self {
        Self::default()
    }

    /// Forward diagnostics to `sink`.
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Debug, args);
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let record = Record::builder()
            .level(level)
            .target(DIAGNOSTICS_TARGET)
            .module_path_static(Some(module_path!()))
            .args(args)
            .build();
        match &self.sink {
            Some(sink) => {
                if sink.enabled(record.metadata()) {
                    sink.log(&record);
                }
            }
            None => {
                if level <= log::max_level() && log::logger().enabled(record.metadata()) {
                    log::logger().log(&record);
                }
            }
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = if self.sink.is_some() { "injected" } else { "global" };
        f.debug_struct("Diagnostics").field("sink", &sink).finish()
    }
}
