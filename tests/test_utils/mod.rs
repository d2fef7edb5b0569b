#![allow(dead_code)]

pub mod collector;
pub mod memory;

pub use collector::{TcpCollector, UdpCollector};
#[cfg(unix)]
pub use collector::UnixCollector;
pub use memory::MemoryConnection;
