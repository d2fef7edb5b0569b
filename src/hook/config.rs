//! Configuration structures consumed by the hook lifecycle.
//!
//! [`HookBuilder`](crate::HookBuilder) constructs these values before passing
//! them to [`Hook`](super::Hook) for runtime use. The knobs that stay mutable
//! after construction live in [`Settings`], shared with the sender thread
//! behind a read/write lock.

use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;

use crate::{
    diagnostics::Diagnostics,
    formatter::SharedFormatter,
    log_record::Fields,
    rate_limited_warner::DEFAULT_WARN_INTERVAL,
};

use super::{
    HookBuildError,
    transport::{Connection, Dialer, NetDialer},
};

/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 65_536;
/// Default first delay between reconnect or rewrite attempts.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(10);
/// Default growth factor applied to the delay after each failure.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.2;
/// Default upper bound for the retry delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(1);
/// Default time `close` waits for queued records to drain.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout applied while dialing a stream transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What `fire` does when the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the new record and warn.
    #[default]
    Drop,
    /// Block the caller until space frees.
    Block,
    /// Block up to the given duration, then drop.
    Timeout(Duration),
}

/// Exponential backoff policy for reconnect and rewrite attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub cap: Duration,
    /// Randomise each delay within its upper half.
    pub jitter: bool,
}

impl BackoffPolicy {
    /// Reject policies that would retry without ever waiting.
    pub fn validate(&self) -> Result<(), HookBuildError> {
        if self.base.is_zero() {
            return Err(HookBuildError::InvalidConfig(
                "backoff_base_ms must be greater than zero".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(HookBuildError::InvalidConfig(format!(
                "backoff_multiplier must be a finite value above 1, got {}",
                self.multiplier
            )));
        }
        if self.cap < self.base {
            return Err(HookBuildError::InvalidConfig(
                "backoff_cap_ms must not be below backoff_base_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            cap: DEFAULT_BACKOFF_CAP,
            jitter: false,
        }
    }
}

/// Static configuration describing how to construct a [`Hook`](super::Hook).
#[derive(Clone, Debug)]
pub struct HookConfig {
    pub protocol: String,
    pub address: String,
    /// Emitted under the `type` key.
    pub app_name: String,
    pub static_fields: Fields,
    pub hook_only_prefix: String,
    pub time_format: Option<String>,
    pub send_timeout: Option<Duration>,
    pub backoff: BackoffPolicy,
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub close_timeout: Duration,
    pub warn_interval: Duration,
}

impl HookConfig {
    /// Configuration with defaults for everything but the target.
    pub fn new(
        protocol: impl Into<String>,
        address: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
            app_name: app_name.into(),
            static_fields: Fields::new(),
            hook_only_prefix: String::new(),
            time_format: None,
            send_timeout: None,
            backoff: BackoffPolicy::default(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }

    /// Check the values `Hook::with_config` cannot run with.
    pub fn validate(&self) -> Result<(), HookBuildError> {
        if self.capacity == 0 {
            return Err(HookBuildError::InvalidConfig(
                "capacity must be greater than zero".into(),
            ));
        }
        self.backoff.validate()
    }
}

/// Pluggable collaborators handed to the hook alongside its configuration.
pub struct Collaborators {
    pub formatter: SharedFormatter,
    pub dialer: Arc<dyn Dialer>,
    pub diagnostics: Diagnostics,
    /// Pre-established connection; skips the initial dial when present.
    pub connection: Option<Box<dyn Connection>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            formatter: SharedFormatter::default(),
            dialer: Arc::new(NetDialer::default()),
            diagnostics: Diagnostics::global(),
            connection: None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("formatter", &self.formatter)
            .field("diagnostics", &self.diagnostics)
            .field("connection", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

/// Settings that may change while the sender thread is running.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub static_fields: Fields,
    pub hook_only_prefix: String,
    pub time_format: Option<String>,
    pub send_timeout: Option<Duration>,
    pub backoff: BackoffPolicy,
    pub overflow_policy: OverflowPolicy,
}

pub(crate) type SharedSettings = Arc<RwLock<Settings>>;

impl Settings {
    pub(crate) fn shared(config: &HookConfig) -> SharedSettings {
        Arc::new(RwLock::new(Self {
            static_fields: config.static_fields.clone(),
            hook_only_prefix: config.hook_only_prefix.clone(),
            time_format: config.time_format.clone().filter(|f| !f.is_empty()),
            send_timeout: config.send_timeout.filter(|t| !t.is_zero()),
            backoff: config.backoff.clone(),
            overflow_policy: config.overflow_policy,
        }))
    }
}
