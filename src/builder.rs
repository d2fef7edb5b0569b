//! Builder for [`Hook`](crate::hook::Hook).
//!
//! Collects the collector target, static fields, queue sizing, timeouts, TLS
//! options and backoff parameters, validates them, and starts the hook.

use std::{fmt, io, sync::Arc, time::Duration};

use log::Log;

use crate::{
    diagnostics::Diagnostics,
    formatter::{RecordFormatter, SharedFormatter, validate_time_format},
    hook::{
        BackoffPolicy, Collaborators, Connection, DEFAULT_CONNECT_TIMEOUT, Dialer, Hook,
        HookBuildError, HookConfig, NetDialer, OverflowPolicy, Protocol, TlsOptions,
    },
    log_record::{FieldValue, Fields},
};

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(HookBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

/// Overrides for the retry backoff applied by the sender thread.
#[derive(Clone, Debug, Default)]
pub struct BackoffOverrides {
    base_ms: Option<u64>,
    multiplier: Option<f64>,
    cap_ms: Option<u64>,
    jitter: Option<bool>,
}

impl BackoffOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the first retry delay in milliseconds.
    pub fn with_base_ms(mut self, base_ms: u64) -> Self {
        self.base_ms = Some(base_ms);
        self
    }

    /// Override the growth factor applied after each failure.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Override the delay cap in milliseconds.
    pub fn with_cap_ms(mut self, cap_ms: u64) -> Self {
        self.cap_ms = Some(cap_ms);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    fn apply(&self, policy: &mut BackoffPolicy) -> Result<(), HookBuildError> {
        if let Some(base) = self.base_ms {
            ensure_positive!(base, "backoff_base_ms")?;
            policy.base = Duration::from_millis(base);
        }
        if let Some(cap) = self.cap_ms {
            ensure_positive!(cap, "backoff_cap_ms")?;
            policy.cap = Duration::from_millis(cap);
        }
        if let Some(multiplier) = self.multiplier {
            policy.multiplier = multiplier;
        }
        if let Some(jitter) = self.jitter {
            policy.jitter = jitter;
        }
        policy.validate()
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`Hook`] instances.
#[derive(Default)]
pub struct HookBuilder {
    protocol: String,
    address: String,
    app_name: String,
    static_fields: Fields,
    prefix: String,
    connection: Option<Box<dyn Connection>>,
    capacity: Option<usize>,
    overflow_policy: Option<OverflowPolicy>,
    send_timeout_ms: Option<u64>,
    time_format: Option<String>,
    backoff: BackoffOverrides,
    close_timeout_ms: Option<u64>,
    warn_interval: Option<Duration>,
    connect_timeout_ms: Option<u64>,
    tls: Option<TlsOptions>,
    formatter: Option<SharedFormatter>,
    dialer: Option<Arc<dyn Dialer>>,
    diagnostics: Option<Arc<dyn Log>>,
}

impl HookBuilder {
    /// Start a builder targeting `protocol://address`, tagging events with
    /// `app_name`.
    pub fn new(
        protocol: impl Into<String>,
        address: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Add a field merged into every record.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.static_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.static_fields.extend(fields);
        self
    }

    /// Prefix marking fields meant only for this hook.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Use an already established connection instead of dialing first.
    pub fn with_connection(mut self, connection: Box<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    option_setter!(
        #[doc = "Set the bounded queue capacity."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(with_overflow_policy, overflow_policy, OverflowPolicy);
    option_setter!(
        #[doc = "Set the per-write deadline in milliseconds."]
        with_send_timeout_ms,
        send_timeout_ms,
        u64
    );
    option_setter!(with_close_timeout_ms, close_timeout_ms, u64);
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(
        #[doc = "Set the minimum spacing between dropped-record warnings."]
        with_warn_interval,
        warn_interval,
        Duration
    );

    /// Block producers when the queue is full instead of dropping.
    pub fn with_block_on_full(self, block: bool) -> Self {
        self.with_overflow_policy(if block {
            OverflowPolicy::Block
        } else {
            OverflowPolicy::Drop
        })
    }

    /// strftime pattern for `@timestamp`.
    pub fn with_time_format(mut self, format: impl Into<String>) -> Self {
        self.time_format = Some(format.into());
        self
    }

    /// Override backoff timings using the provided overrides.
    pub fn with_backoff(mut self, overrides: BackoffOverrides) -> Self {
        self.backoff = overrides;
        self
    }

    /// Configure TLS using the provided domain and validation policy.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsOptions {
            domain,
            insecure_skip_verify: insecure,
        });
        self
    }

    pub fn with_formatter(mut self, formatter: impl RecordFormatter + 'static) -> Self {
        self.formatter = Some(SharedFormatter::new(formatter));
        self
    }

    /// Replace the socket dialer, e.g. with an in-memory double.
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Send the hook's own diagnostics to `sink` instead of the global logger.
    pub fn with_diagnostics(mut self, sink: Arc<dyn Log>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    fn validate(&self) -> Result<(), HookBuildError> {
        self.validate_target()?;
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        if let Some(timeout) = self.send_timeout_ms {
            ensure_positive!(timeout, "send_timeout_ms")?;
        }
        if let Some(timeout) = self.close_timeout_ms {
            ensure_positive!(timeout, "close_timeout_ms")?;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(pattern) = self.time_format.as_deref().filter(|p| !p.is_empty()) {
            validate_time_format(pattern)
                .map_err(|err| HookBuildError::InvalidConfig(err.to_string()))?;
        }
        Ok(())
    }

    fn validate_target(&self) -> Result<(), HookBuildError> {
        if self.protocol.trim().is_empty() {
            return Err(HookBuildError::InvalidConfig("protocol must not be empty".into()));
        }
        if self.address.trim().is_empty() {
            return Err(HookBuildError::InvalidConfig("address must not be empty".into()));
        }
        if self.dialer.is_some() {
            if self.tls.is_some() {
                return Err(HookBuildError::InvalidConfig(
                    "tls options only apply to the built-in dialer".into(),
                ));
            }
            return Ok(());
        }
        let protocol: Protocol = self
            .protocol
            .parse()
            .map_err(|err: io::Error| HookBuildError::InvalidConfig(err.to_string()))?;
        if self.tls.is_some() && protocol != Protocol::Tls {
            return Err(HookBuildError::InvalidConfig(
                "tls is only supported for the tls protocol".into(),
            ));
        }
        Ok(())
    }

    fn build_config(&self) -> Result<HookConfig, HookBuildError> {
        self.validate()?;
        let mut config = HookConfig::new(&*self.protocol, &*self.address, &*self.app_name);
        config.static_fields = self.static_fields.clone();
        config.hook_only_prefix = self.prefix.clone();
        config.time_format = self.time_format.clone().filter(|f| !f.is_empty());
        config.send_timeout = self.send_timeout_ms.map(Duration::from_millis);
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(policy) = self.overflow_policy {
            config.overflow_policy = policy;
        }
        if let Some(timeout) = self.close_timeout_ms {
            config.close_timeout = Duration::from_millis(timeout);
        }
        if let Some(interval) = self.warn_interval {
            config.warn_interval = interval;
        }
        self.backoff.apply(&mut config.backoff)?;
        Ok(config)
    }

    /// Validate the configuration and start the hook's sender thread.
    pub fn build(self) -> Result<Hook, HookBuildError> {
        let config = self.build_config()?;
        let dialer = match self.dialer {
            Some(dialer) => dialer,
            None => Arc::new(NetDialer::new(
                self.connect_timeout_ms
                    .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_millis),
                self.tls.unwrap_or_default(),
            )),
        };
        let collaborators = Collaborators {
            formatter: self.formatter.unwrap_or_default(),
            dialer,
            diagnostics: self
                .diagnostics
                .map_or_else(Diagnostics::global, Diagnostics::new),
            connection: self.connection,
        };
        Hook::with_config(config, collaborators)
    }
}

impl fmt::Debug for HookBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBuilder")
            .field("protocol", &self.protocol)
            .field("address", &self.address)
            .field("app_name", &self.app_name)
            .field("static_fields", &self.static_fields)
            .field("prefix", &self.prefix)
            .field("capacity", &self.capacity)
            .field("overflow_policy", &self.overflow_policy)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
