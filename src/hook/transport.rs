//! Transport primitives for the hook.
//!
//! The connection manager only sees the [`Dialer`] and [`Connection`] traits.
//! [`NetDialer`] implements them over the standard library sockets, with TLS
//! layered on TCP through `native-tls`.

use std::{
    io::{self, Write},
    net::{
        IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket,
    },
    str::FromStr,
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use super::config::DEFAULT_CONNECT_TIMEOUT;

/// A live, writable link to the collector.
pub trait Connection: Send {
    /// Apply a write deadline to subsequent writes; `None` blocks indefinitely.
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Write one complete payload.
    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Release the underlying resources. Called when the connection is replaced.
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capability to open connections: `dial(protocol, address) -> connection`.
pub trait Dialer: Send + Sync {
    fn dial(&self, protocol: &str, address: &str) -> io::Result<Box<dyn Connection>>;
}

/// Protocols understood by [`NetDialer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Unix,
    Tls,
}

impl FromStr for Protocol {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "tcp4" | "tcp6" => Ok(Protocol::Tcp),
            "udp" | "udp4" | "udp6" => Ok(Protocol::Udp),
            "unix" => Ok(Protocol::Unix),
            "tls" | "tcp+tls" => Ok(Protocol::Tls),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported protocol {other:?}"),
            )),
        }
    }
}

/// TLS connection options.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// Domain presented during the handshake; defaults to the address host.
    pub domain: Option<String>,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Active socket connection state.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection for ActiveConnection {
    fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.set_write_timeout(timeout),
            ActiveConnection::Tls(stream) => stream.get_ref().set_write_timeout(timeout),
            ActiveConnection::Udp(socket) => socket.set_write_timeout(timeout),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.set_write_timeout(timeout),
        }
    }

    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => {
                stream.write_all(payload)?;
                stream.flush()
            }
            ActiveConnection::Tls(stream) => {
                stream.write_all(payload)?;
                stream.flush()
            }
            ActiveConnection::Udp(socket) => {
                let sent = socket.send(payload)?;
                if sent != payload.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("datagram truncated: sent {sent} of {} bytes", payload.len()),
                    ));
                }
                Ok(())
            }
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => {
                stream.write_all(payload)?;
                stream.flush()
            }
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.shutdown(Shutdown::Both),
            ActiveConnection::Tls(stream) => stream.shutdown(),
            ActiveConnection::Udp(_) => Ok(()),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

/// Dialer over standard library sockets.
#[derive(Clone, Debug)]
pub struct NetDialer {
    connect_timeout: Duration,
    tls: TlsOptions,
}

impl Default for NetDialer {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tls: TlsOptions::default(),
        }
    }
}

impl NetDialer {
    pub fn new(connect_timeout: Duration, tls: TlsOptions) -> Self {
        Self {
            connect_timeout,
            tls,
        }
    }

    /// Establish a connection of the given protocol.
    pub fn connect(&self, protocol: Protocol, address: &str) -> io::Result<ActiveConnection> {
        match protocol {
            Protocol::Tcp => {
                connect_tcp(address, self.connect_timeout).map(ActiveConnection::PlainTcp)
            }
            Protocol::Tls => self.connect_tls(address),
            Protocol::Udp => connect_udp(address).map(ActiveConnection::Udp),
            Protocol::Unix => connect_unix(address),
        }
    }

    fn connect_tls(&self, address: &str) -> io::Result<ActiveConnection> {
        let stream = connect_tcp(address, self.connect_timeout)?;
        let connector = self.tls.connector()?;
        let domain = match &self.tls.domain {
            Some(domain) if !domain.trim().is_empty() => domain.clone(),
            _ => host_of(address).to_owned(),
        };
        stream.set_read_timeout(Some(self.connect_timeout))?;
        stream.set_write_timeout(Some(self.connect_timeout))?;
        let stream = connector
            .connect(&domain, stream)
            .map_err(io::Error::other)?;
        let tcp_ref = stream.get_ref();
        tcp_ref.set_read_timeout(None)?;
        tcp_ref.set_write_timeout(None)?;
        Ok(ActiveConnection::Tls(Box::new(stream)))
    }
}

impl Dialer for NetDialer {
    fn dial(&self, protocol: &str, address: &str) -> io::Result<Box<dyn Connection>> {
        let protocol = protocol.parse()?;
        Ok(Box::new(self.connect(protocol, address)?))
    }
}

fn host_of(address: &str) -> &str {
    let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

fn resolve(address: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<_> = address.to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{address} resolved to no addresses"),
        ));
    }
    Ok(addrs)
}

fn connect_tcp(address: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in resolve(address)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::TimedOut, format!("unable to connect to {address}"))
    }))
}

fn connect_udp(address: &str) -> io::Result<UdpSocket> {
    let mut last_err = None;
    for addr in resolve(address)? {
        let local = if addr.is_ipv4() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };
        let attempt = UdpSocket::bind(local).and_then(|socket| {
            socket.connect(addr)?;
            Ok(socket)
        });
        match attempt {
            Ok(socket) => return Ok(socket),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, format!("unable to reach {address}"))
    }))
}

#[cfg(unix)]
fn connect_unix(path: &str) -> io::Result<ActiveConnection> {
    UnixStream::connect(path).map(ActiveConnection::Unix)
}

#[cfg(not(unix))]
fn connect_unix(_path: &str) -> io::Result<ActiveConnection> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unix domain sockets are not supported on this platform",
    ))
}
