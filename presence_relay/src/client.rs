// One connected peer, as the relay sees it.
//
// A `Client` owns the write side of its connection (behind the `Transport`
// trait), the presence state it last published, and the id of the session
// it belongs to. The session link is an id, not a reference: the relay
// resolves it through the `Registry`, and `Session` in turn lists member
// ids that resolve through the relay's `ClientTable`.
//
// Sends are fire-and-forget and never block the caller. Over the network
// the transport is an `Outbound` queue drained by the connection's own
// thread. A peer that stops reading fills its queue, and the next send shuts
// its socket down; the connection thread then reports the disconnect, which
// is where cleanup happens.

use std::collections::BTreeMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use presence_protocol::{ClientId, ClientState, ServerMessage, SessionId, StateError};
use serde_json::Value;

/// Messages a connection may have queued before the relay gives up on it.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Write side of a client connection. Receives one JSON text message per
/// call and must not block.
pub trait Transport: Send {
    fn deliver(&mut self, payload: &str) -> io::Result<()>;
}

/// Bounded queue into a connection thread, plus a handle on the socket so
/// an overflowing connection can be cut off.
pub struct Outbound {
    queue: SyncSender<String>,
    socket: TcpStream,
    peer: Option<SocketAddr>,
    closed: bool,
}

impl Outbound {
    /// Returns the transport and the receiving end the connection thread
    /// drains.
    pub fn new(socket: TcpStream) -> (Self, Receiver<String>) {
        let (queue, pending) = mpsc::sync_channel(OUTBOUND_QUEUE_DEPTH);
        let peer = socket.peer_addr().ok();
        let outbound = Self {
            queue,
            socket,
            peer,
            closed: false,
        };
        (outbound, pending)
    }
}

impl Transport for Outbound {
    fn deliver(&mut self, payload: &str) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        match self.queue.try_send(payload.to_owned()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(peer = ?self.peer, "peer is not reading, closing connection");
                self.closed = true;
                self.socket.shutdown(Shutdown::Both).ok();
                Err(io::Error::new(io::ErrorKind::WouldBlock, "outbound queue full"))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.closed = true;
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection thread exited"))
            }
        }
    }
}

/// All live clients, keyed by id.
pub type ClientTable = BTreeMap<ClientId, Client>;

/// Where a connection is in the message protocol. A closed connection has
/// no `Client` at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    Unjoined,
    InSession,
}

pub struct Client {
    id: ClientId,
    transport: Box<dyn Transport>,
    state: Option<ClientState>,
    session: Option<SessionId>,
}

impl Client {
    /// A freshly connected client: no session, no state.
    pub fn new(id: ClientId, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            transport,
            state: None,
            session: None,
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub(crate) fn set_session(&mut self, session: Option<SessionId>) {
        self.session = session;
    }

    pub fn state(&self) -> Option<&ClientState> {
        self.state.as_ref()
    }

    /// Replace the whole state (on create/join).
    pub fn replace_state(&mut self, state: ClientState) {
        self.state = Some(state);
    }

    /// Apply one property update to the current state.
    pub fn update_state(
        &mut self,
        fragment: &str,
        property: &str,
        value: Value,
    ) -> Result<(), StateError> {
        self.state
            .get_or_insert_with(ClientState::new)
            .set_property(fragment, property, value)
    }

    pub fn phase(&self) -> ConnectionPhase {
        if self.session.is_some() {
            ConnectionPhase::InSession
        } else {
            ConnectionPhase::Unjoined
        }
    }

    /// Serialize and send one message to this client.
    pub fn send(&mut self, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.deliver(&json),
            Err(e) => tracing::warn!(client = %self.id, error = %e, "failed to encode message"),
        }
    }

    /// Send an already-serialized message. Used by broadcasts so the
    /// payload is encoded once per fan-out rather than once per recipient.
    pub(crate) fn deliver(&mut self, payload: &str) {
        if let Err(e) = self.transport.deliver(payload) {
            tracing::debug!(client = %self.id, error = %e, "send failed");
        }
    }
}
