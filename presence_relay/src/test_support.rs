// In-memory transports for unit tests.

use std::io;
use std::sync::{Arc, Mutex};

use presence_protocol::ServerMessage;

use crate::client::Transport;

/// Records every delivered message. Clones share the same buffer, so a test
/// keeps one clone and hands the other to the relay.
#[derive(Clone, Default)]
pub struct Outbox {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Outbox {
    /// Drain and decode everything delivered so far.
    pub fn take(&self) -> Vec<ServerMessage> {
        self.take_text()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// Drain everything delivered so far, exactly as sent.
    pub fn take_text(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

impl Transport for Outbox {
    fn deliver(&mut self, payload: &str) -> io::Result<()> {
        self.messages.lock().unwrap().push(payload.to_owned());
        Ok(())
    }
}

/// A transport whose peer has gone away.
pub struct BrokenTransport;

impl Transport for BrokenTransport {
    fn deliver(&mut self, _payload: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"))
    }
}
