//! Ship structured log records to Logstash.
//!
//! A [`Hook`] accepts [`LogRecord`]s without blocking, merges its static
//! fields into each one, serialises it as a Logstash JSON event and writes it
//! to a collector over TCP, UDP, a Unix socket or TLS from a background
//! thread. Lost connections are re-established with exponential backoff.
//!
//! ```no_run
//! use std::time::Duration;
//! use logstash_hook::{HookBuilder, Level, LogRecord};
//!
//! let hook = HookBuilder::new("tcp", "127.0.0.1:5000", "billing")
//!     .with_field("env", "prod")
//!     .build()?;
//! hook.fire(LogRecord::new(Level::Info, "invoice sent").with_field("id", 42));
//! hook.flush(Duration::from_secs(1))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod diagnostics;
pub mod formatter;
mod handler;
pub mod hook;
mod level;
mod log_compat;
mod log_record;
mod rate_limited_warner;

pub use builder::{BackoffOverrides, HookBuilder};
pub use diagnostics::{DIAGNOSTICS_TARGET, Diagnostics};
pub use formatter::{
    FormatError, FormatOptions, LogstashFormatter, RecordFormatter, SharedFormatter,
};
pub use handler::LogHook;
pub use hook::{
    BackoffPolicy, Collaborators, Connection, Dialer, Hook, HookBuildError, HookConfig, HookError,
    NetDialer, OverflowPolicy, Protocol, TlsOptions,
};
pub use level::{Level, ParseLevelError};
pub use log_compat::{DEFAULT_BRIDGE_FLUSH_TIMEOUT, LogstashLogger, to_record};
pub use log_record::{FieldValue, Fields, LogRecord};
pub use rate_limited_warner::DEFAULT_WARN_INTERVAL;
