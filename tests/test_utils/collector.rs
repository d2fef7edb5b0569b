//! Local collectors standing in for a Logstash input.
//!
//! Each collector runs on its own thread and forwards every received event,
//! decoded from JSON, over a channel.

use std::{
    io::{BufRead, BufReader, Read},
    net::{SocketAddr, TcpListener, UdpSocket},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::Value;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn forward_lines(stream: impl Read, tx: &Sender<Value>) {
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { return };
        let event = serde_json::from_str(&line).expect("collector received json line");
        if tx.send(event).is_err() {
            return;
        }
    }
}

fn recv(rx: &Receiver<Value>) -> Value {
    rx.recv_timeout(RECV_TIMEOUT)
        .expect("collector received an event")
}

/// TCP listener accepting connections and reading newline-delimited events.
pub struct TcpCollector {
    addr: SocketAddr,
    events: Receiver<Value>,
}

impl TcpCollector {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind tcp collector");
        let addr = listener.local_addr().expect("collector address");
        let (tx, events) = unbounded();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let tx = tx.clone();
                thread::spawn(move || forward_lines(stream, &tx));
            }
        });
        Self { addr, events }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn recv(&self) -> Value {
        recv(&self.events)
    }
}

/// UDP socket treating every datagram as one event.
pub struct UdpCollector {
    addr: SocketAddr,
    events: Receiver<Value>,
}

impl UdpCollector {
    pub fn start() -> Self {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).expect("bind udp collector");
        let addr = socket.local_addr().expect("collector address");
        let (tx, events) = unbounded();
        thread::spawn(move || {
            let mut buf = vec![0u8; 65_536];
            loop {
                let Ok(len) = socket.recv(&mut buf) else { return };
                let event = serde_json::from_slice(&buf[..len]).expect("datagram is json");
                if tx.send(event).is_err() {
                    return;
                }
            }
        });
        Self { addr, events }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn recv(&self) -> Value {
        recv(&self.events)
    }
}

/// Unix domain socket listener inside a temporary directory.
#[cfg(unix)]
pub struct UnixCollector {
    path: std::path::PathBuf,
    events: Receiver<Value>,
    _dir: tempfile::TempDir,
}

#[cfg(unix)]
impl UnixCollector {
    pub fn start() -> Self {
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().expect("create socket directory");
        let path = dir.path().join("logstash.sock");
        let listener = UnixListener::bind(&path).expect("bind unix collector");
        let (tx, events) = unbounded();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let tx = tx.clone();
                thread::spawn(move || forward_lines(stream, &tx));
            }
        });
        Self {
            path,
            events,
            _dir: dir,
        }
    }

    pub fn address(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub fn recv(&self) -> Value {
        recv(&self.events)
    }
}
