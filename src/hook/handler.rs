//! Public hook type exported by the crate.

use std::{sync::Arc, thread::JoinHandle, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use parking_lot::Mutex;

use crate::{
    diagnostics::Diagnostics,
    formatter::{FormatError, strip_prefixed_fields, validate_time_format},
    handler::LogHook,
    level::Level,
    log_record::{FieldValue, Fields, LogRecord},
};

use super::{
    HookBuildError, HookError,
    config::{BackoffPolicy, Collaborators, HookConfig, OverflowPolicy, Settings, SharedSettings},
    connection::ConnectionManager,
    queue::{DispatchQueue, Pending, dispatch_queue},
    shutdown::{ShutdownTrigger, shutdown_pair},
    worker::{SenderLoop, spawn_worker},
};

struct Lifecycle {
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    trigger: ShutdownTrigger,
}

/// Hook forwarding records to a Logstash collector.
///
/// Records handed to [`fire`](Hook::fire) are queued and shipped by a
/// dedicated sender thread, which reconnects with exponential backoff
/// whenever the transport fails.
pub struct Hook {
    app_name: String,
    queue: DispatchQueue,
    pending: Arc<Pending>,
    settings: SharedSettings,
    diagnostics: Diagnostics,
    close_timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl Hook {
    /// Construct the hook and start its sender thread.
    ///
    /// Rejects a zero capacity or a backoff policy that would retry in a
    /// tight loop.
    pub fn with_config(
        config: HookConfig,
        collaborators: Collaborators,
    ) -> Result<Self, HookBuildError> {
        config.validate()?;
        let Collaborators {
            formatter,
            dialer,
            diagnostics,
            connection,
        } = collaborators;
        let settings = Settings::shared(&config);
        let (queue, rx) =
            dispatch_queue(config.capacity, config.warn_interval, diagnostics.clone());
        let pending = queue.pending();
        let (trigger, signal) = shutdown_pair();
        let (done, done_rx) = bounded(0);

        let connection = ConnectionManager::new(
            dialer,
            config.protocol.as_str(),
            config.address.as_str(),
            settings.clone(),
            signal,
            diagnostics.clone(),
        )
        .with_connection(connection);
        let handle = spawn_worker(SenderLoop {
            rx,
            connection,
            settings: settings.clone(),
            formatter,
            app_name: config.app_name.clone(),
            pending: pending.clone(),
            diagnostics: diagnostics.clone(),
            done,
        })?;

        Ok(Self {
            app_name: config.app_name,
            queue,
            pending,
            settings,
            diagnostics,
            close_timeout: config.close_timeout,
            lifecycle: Mutex::new(Lifecycle {
                handle: Some(handle),
                done_rx,
                trigger,
            }),
        })
    }

    /// Queue `record` for asynchronous delivery.
    ///
    /// Never fails: when the queue is full the configured overflow policy
    /// decides between waiting and dropping with a warning.
    pub fn fire(&self, record: LogRecord) {
        let policy = self.settings.read().overflow_policy;
        self.queue.enqueue(record, policy);
    }

    /// Add a field sent with every record.
    pub fn set_field(&self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.settings
            .write()
            .static_fields
            .insert(key.into(), value.into());
    }

    /// Add several fields sent with every record, replacing existing keys.
    pub fn set_fields(&self, fields: Fields) {
        self.settings.write().static_fields.extend(fields);
    }

    /// Change the prefix marking hook-only fields.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        self.settings.write().hook_only_prefix = prefix.into();
    }

    /// Set the strftime pattern for `@timestamp`; `None` restores RFC 3339.
    pub fn set_time_format(&self, format: Option<String>) -> Result<(), FormatError> {
        let format = format.filter(|f| !f.is_empty());
        if let Some(pattern) = &format {
            validate_time_format(pattern)?;
        }
        self.settings.write().time_format = format;
        Ok(())
    }

    pub fn set_overflow_policy(&self, policy: OverflowPolicy) {
        self.settings.write().overflow_policy = policy;
    }

    /// Toggle between blocking and dropping when the queue is full.
    pub fn set_block_on_full(&self, block: bool) {
        self.set_overflow_policy(if block {
            OverflowPolicy::Block
        } else {
            OverflowPolicy::Drop
        });
    }

    /// Write deadline applied to each send; `None` or zero disables it.
    pub fn set_send_timeout(&self, timeout: Option<Duration>) {
        self.settings.write().send_timeout = timeout.filter(|t| !t.is_zero());
    }

    /// Replace the retry backoff; an invalid policy leaves the current one.
    pub fn set_backoff(&self, policy: BackoffPolicy) -> Result<(), HookBuildError> {
        policy.validate()?;
        self.settings.write().backoff = policy;
        Ok(())
    }

    /// Remove hook-only fields from a record the caller keeps for itself.
    pub fn strip_hook_only(&self, record: &mut LogRecord) {
        let prefix = self.settings.read().hook_only_prefix.clone();
        strip_prefixed_fields(&mut record.fields, &prefix);
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn prefix(&self) -> String {
        self.settings.read().hook_only_prefix.clone()
    }

    /// Snapshot of the fields sent with every record.
    pub fn static_fields(&self) -> Fields {
        self.settings.read().static_fields.clone()
    }

    /// Levels this hook accepts: all of them.
    pub fn levels(&self) -> &'static [Level] {
        &Level::ALL
    }

    /// Wait until every queued record has been handed to the transport.
    ///
    /// Records fired concurrently with the call may or may not be covered,
    /// and success says nothing about the collector having received them.
    /// Fails with [`HookError::Closed`] once [`close`](Hook::close) has run.
    pub fn flush(&self, timeout: Duration) -> Result<(), HookError> {
        self.queue.flush_warnings();
        if self.is_closed() {
            return Err(HookError::Closed);
        }
        if self.pending.wait_drained(timeout) {
            Ok(())
        } else {
            Err(HookError::FlushTimeout(timeout))
        }
    }

    /// Stop accepting records, drain what is queued, and join the sender.
    ///
    /// Waits up to the configured close timeout for the queue to drain,
    /// then interrupts any retry in progress. Calling `close` again is a
    /// no-op.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let Some(handle) = lifecycle.handle.take() else {
            return;
        };
        self.queue.close();
        if let Err(RecvTimeoutError::Timeout) = lifecycle.done_rx.recv_timeout(self.close_timeout)
        {
            self.diagnostics.warn(format_args!(
                "sender did not drain within {:?}; cancelling",
                self.close_timeout
            ));
        }
        lifecycle.trigger.trigger();
        if handle.join().is_err() {
            self.diagnostics.error(format_args!("sender thread panicked"));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl LogHook for Hook {
    fn levels(&self) -> &'static [Level] {
        Hook::levels(self)
    }

    fn fire(&self, record: LogRecord) {
        Hook::fire(self, record);
    }

    fn flush(&self, timeout: Duration) -> Result<(), HookError> {
        Hook::flush(self, timeout)
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("app_name", &self.app_name)
            .field("pending", &self.pending.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}
