//! In-memory transport doubles shared by the hook unit tests.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde_json::Value;

use super::transport::{Connection, Dialer};

#[derive(Default)]
struct LinkState {
    payloads: Vec<Vec<u8>>,
    write_attempts: Vec<Instant>,
    write_timeouts: Vec<Option<Duration>>,
    failing_writes: usize,
    shutdowns: usize,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

/// Shared record of everything written through mock connections.
#[derive(Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

/// Holds writes open until released.
pub struct WriteGate {
    started: Receiver<()>,
    release: Sender<()>,
}

impl WriteGate {
    /// Wait until a write has reached the gate.
    pub fn wait_started(&self, timeout: Duration) -> bool {
        self.started.recv_timeout(timeout).is_ok()
    }

    /// Let every held and future write through.
    pub fn release_all(self) {
        drop(self.release);
    }
}

impl MockLink {
    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(MockConnection { link: self.clone() })
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().failing_writes = count;
    }

    pub fn gate(&self) -> WriteGate {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        self.state.lock().gate = Some((started_tx, release_rx));
        WriteGate {
            started: started_rx,
            release: release_tx,
        }
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.state.lock().payloads.clone()
    }

    /// Decode every payload as one JSON document.
    pub fn events(&self) -> Vec<Value> {
        self.payloads()
            .iter()
            .map(|p| serde_json::from_slice(p).expect("payload is json"))
            .collect()
    }

    pub fn write_attempts(&self) -> Vec<Instant> {
        self.state.lock().write_attempts.clone()
    }

    pub fn write_timeouts(&self) -> Vec<Option<Duration>> {
        self.state.lock().write_timeouts.clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().shutdowns
    }
}

struct MockConnection {
    link: MockLink,
}

impl Connection for MockConnection {
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.link.state.lock().write_timeouts.push(timeout);
        Ok(())
    }

    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        let gate = {
            let mut state = self.link.state.lock();
            state.write_attempts.push(Instant::now());
            state.gate.clone()
        };
        if let Some((started, release)) = gate {
            let _ = started.send(());
            let _ = release.recv();
        }
        let mut state = self.link.state.lock();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.payloads.push(payload.to_vec());
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.link.state.lock().shutdowns += 1;
        Ok(())
    }
}

/// Dialer handing out connections onto one [`MockLink`].
pub struct MockDialer {
    link: MockLink,
    failing_dials: AtomicUsize,
    attempts: AtomicUsize,
}

impl MockDialer {
    pub fn new(link: MockLink) -> Self {
        Self {
            link,
            failing_dials: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.failing_dials.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Dialer for MockDialer {
    fn dial(&self, _protocol: &str, _address: &str) -> io::Result<Box<dyn Connection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_dials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "mock dial refused",
            ));
        }
        Ok(self.link.connection())
    }
}
