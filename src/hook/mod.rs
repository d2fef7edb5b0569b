//! Asynchronous Logstash hook.
//!
//! This module defines [`Hook`], which merges static fields into each
//! [`LogRecord`](crate::log_record::LogRecord), serialises it as a Logstash
//! JSON event and ships it to a collector over TCP, UDP, Unix sockets or TLS.
//! A single sender thread owns the connection, reconnects with exponential
//! backoff and keeps retrying a failed write until it succeeds or the hook
//! is closed.

use std::{io, time::Duration};

use thiserror::Error;

pub(crate) mod backoff;
mod config;
mod connection;
mod handler;
mod queue;
mod shutdown;
mod transport;
mod worker;

#[cfg(test)]
mod test_support;

pub use config::{
    BackoffPolicy, Collaborators, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP,
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_QUEUE_CAPACITY, HookConfig, OverflowPolicy,
};
pub use handler::Hook;
pub use transport::{ActiveConnection, Connection, Dialer, NetDialer, Protocol, TlsOptions};

/// Errors raised while configuring or starting a hook.
#[derive(Debug, Error)]
pub enum HookBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid hook configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst starting the hook.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors reported by hook operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    /// Queued records were still pending when the flush deadline passed.
    #[error("flush timed out after {0:?}")]
    FlushTimeout(Duration),
    /// The hook no longer accepts work.
    #[error("hook is closed")]
    Closed,
}
