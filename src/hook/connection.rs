//! Connection manager owned by the sender thread.
//!
//! Holds at most one live [`Connection`]. Dialing and writing retry forever
//! with exponential backoff; only the shutdown signal ends a retry loop.

use std::{io, sync::Arc, time::Duration};

use crate::diagnostics::Diagnostics;

use super::{
    backoff::Backoff,
    config::SharedSettings,
    shutdown::ShutdownSignal,
    transport::{Connection, Dialer},
};

/// Returned when the shutdown signal interrupts a retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cancelled;

pub struct ConnectionManager {
    dialer: Arc<dyn Dialer>,
    protocol: String,
    address: String,
    conn: Option<Box<dyn Connection>>,
    settings: SharedSettings,
    shutdown: ShutdownSignal,
    diagnostics: Diagnostics,
}

impl ConnectionManager {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        protocol: impl Into<String>,
        address: impl Into<String>,
        settings: SharedSettings,
        shutdown: ShutdownSignal,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            dialer,
            protocol: protocol.into(),
            address: address.into(),
            conn: None,
            settings,
            shutdown,
            diagnostics,
        }
    }

    /// Adopt a connection established by the caller.
    pub fn with_connection(mut self, conn: Option<Box<dyn Connection>>) -> Self {
        self.conn = conn;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Dial until a connection is established or shutdown is raised.
    pub fn connect(&mut self) -> Result<(), Cancelled> {
        let mut backoff = Backoff::new(self.settings.read().backoff.clone());
        loop {
            if self.shutdown.is_triggered() {
                return Err(Cancelled);
            }
            match self.dialer.dial(&self.protocol, &self.address) {
                Ok(conn) => {
                    self.replace(conn);
                    return Ok(());
                }
                Err(err) => {
                    self.diagnostics.error(format_args!(
                        "unable to connect to {}://{}: {err}",
                        self.protocol, self.address
                    ));
                    if !self.shutdown.sleep(backoff.next_delay()) {
                        return Err(Cancelled);
                    }
                }
            }
        }
    }

    /// Write `payload` as a whole, reconnecting after every failure.
    pub fn write(&mut self, payload: &[u8]) -> Result<(), Cancelled> {
        let (send_timeout, policy) = {
            let settings = self.settings.read();
            (settings.send_timeout, settings.backoff.clone())
        };
        let mut backoff = Backoff::new(policy);
        loop {
            let outcome = match self.conn.as_deref_mut() {
                Some(conn) => write_once(conn, payload, send_timeout),
                None => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no active connection",
                )),
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(err) => {
                    self.diagnostics.error(format_args!("unable to write: {err}"));
                    if !self.shutdown.sleep(backoff.next_delay()) {
                        return Err(Cancelled);
                    }
                    self.connect()?;
                }
            }
        }
    }

    fn replace(&mut self, conn: Box<dyn Connection>) {
        if let Some(mut previous) = self.conn.replace(conn)
            && let Err(err) = previous.shutdown()
        {
            self.diagnostics
                .debug(format_args!("closing replaced connection failed: {err}"));
        }
    }
}

fn write_once(
    conn: &mut dyn Connection,
    payload: &[u8],
    send_timeout: Option<Duration>,
) -> io::Result<()> {
    conn.set_write_timeout(send_timeout)?;
    conn.write_payload(payload)
}
