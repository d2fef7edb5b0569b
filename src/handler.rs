//! Core trait for hooks that receive log records.

use std::time::Duration;

use crate::{hook::HookError, level::Level, log_record::LogRecord};

/// Trait implemented by hooks that accept log records.
///
/// `fire` must not block on I/O; implementations hand the record to their
/// own consumer thread and return.
pub trait LogHook: Send + Sync {
    /// Severities this hook wants to receive.
    fn levels(&self) -> &'static [Level];

    /// Dispatch a record for delivery.
    fn fire(&self, record: LogRecord);

    /// Wait for previously fired records to be handed off.
    fn flush(&self, _timeout: Duration) -> Result<(), HookError> {
        Ok(())
    }
}
