//! Cancellation signal bounding the sender's retry loops.
//!
//! The trigger owns the only sender of a zero-capacity channel. Dropping it
//! disconnects every [`ShutdownSignal`], which wakes sleepers immediately.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};

/// Raises the shutdown signal when triggered or dropped.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: Option<Sender<()>>,
}

/// Observes the shutdown state and provides interruptible sleeps.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

/// Create a linked trigger/signal pair.
pub fn shutdown_pair() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = bounded(0);
    (ShutdownTrigger { tx: Some(tx) }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&mut self) {
        self.tx.take();
    }
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `delay`, returning `false` if shutdown was raised meanwhile.
    pub fn sleep(&self, delay: Duration) -> bool {
        !matches!(
            self.rx.recv_timeout(delay),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
