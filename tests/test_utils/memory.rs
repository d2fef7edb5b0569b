//! In-memory [`Connection`] capturing every payload the hook writes.

use std::{io, sync::Arc, time::Duration};

use logstash_hook::Connection;
use parking_lot::Mutex;
use serde_json::Value;

/// Cloneable handle onto the payloads written by a [`MemoryConnection`].
#[derive(Clone, Default)]
pub struct MemoryConnection {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemoryConnection {
    /// Boxed connection writing into this buffer.
    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(self.clone())
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }

    /// Decode each payload as one JSON event.
    pub fn events(&self) -> Vec<Value> {
        self.payloads()
            .iter()
            .map(|payload| serde_json::from_slice(payload).expect("payload is json"))
            .collect()
    }
}

impl Connection for MemoryConnection {
    fn set_write_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn write_payload(&mut self, payload: &[u8]) -> io::Result<()> {
        self.payloads.lock().push(payload.to_vec());
        Ok(())
    }
}
