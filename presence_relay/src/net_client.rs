// Blocking WebSocket client for the presence relay.
//
// Architecture:
// - `connect()` opens the TCP connection and performs the WebSocket
//   handshake on the calling thread.
// - Every message is one JSON text frame. Sends write and flush
//   synchronously, which is fine for presence-sized messages.
// - `poll()` drains whatever has already arrived without blocking;
//   `recv_timeout()` waits for one message.
//
// Used by the integration tests and by anything embedding a relay peer in a
// Rust process.

use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use presence_protocol::{ClientMessage, ClientState, PropertyUpdate, ServerMessage, SessionId};
use serde_json::Value;
use tungstenite::{Message, WebSocket};

#[derive(Debug, thiserror::Error)]
pub enum NetClientError {
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),

    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),

    #[error("cannot encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct NetClient {
    socket: WebSocket<TcpStream>,
}

impl NetClient {
    /// Connect to a relay and complete the WebSocket handshake.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, NetClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true).ok();
        let url = format!("ws://{}/", stream.peer_addr()?);
        let (socket, _response) = tungstenite::client(url, stream)
            .map_err(|e| NetClientError::Handshake(e.to_string()))?;
        Ok(Self { socket })
    }

    /// Ask the relay for a new session. The id arrives as
    /// `ServerMessage::SessionCreated`.
    pub fn create_session(&mut self, state: ClientState) -> Result<(), NetClientError> {
        self.send(&ClientMessage::CreateSession { state })
    }

    pub fn join_session(
        &mut self,
        id: SessionId,
        state: ClientState,
    ) -> Result<(), NetClientError> {
        self.send(&ClientMessage::JoinSession { id, state })
    }

    /// Publish `state[fragment][property] = value` to the session.
    pub fn update_state(
        &mut self,
        fragment: &str,
        property: &str,
        value: Value,
    ) -> Result<(), NetClientError> {
        self.send(&ClientMessage::StateUpdate {
            fragment: fragment.into(),
            state: PropertyUpdate(property.into(), value),
        })
    }

    pub fn send(&mut self, msg: &ClientMessage) -> Result<(), NetClientError> {
        let json = serde_json::to_string(msg)?;
        self.send_raw(&json)
    }

    /// Send arbitrary text as one frame, bypassing message encoding.
    pub fn send_raw(&mut self, text: &str) -> Result<(), NetClientError> {
        self.socket.send(Message::text(text.to_owned()))?;
        Ok(())
    }

    /// Drain all server messages that have already arrived (non-blocking).
    pub fn poll(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        if self.socket.get_ref().set_nonblocking(true).is_err() {
            return messages;
        }
        while let Some(msg) = self.read_one() {
            messages.push(msg);
        }
        self.socket.get_ref().set_nonblocking(false).ok();
        messages
    }

    /// Wait up to `timeout` for the next server message.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ServerMessage> {
        if timeout.is_zero() {
            return self.poll().into_iter().next();
        }
        self.socket.get_ref().set_read_timeout(Some(timeout)).ok()?;
        self.read_one()
    }

    /// Close the connection. The relay treats this as leaving the session.
    pub fn disconnect(&mut self) {
        self.socket.close(None).ok();
        self.socket.flush().ok();
        self.socket.get_ref().shutdown(Shutdown::Both).ok();
    }

    /// Read frames until one decodes as a server message or nothing more
    /// is available.
    fn read_one(&mut self) -> Option<ServerMessage> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                    Ok(msg) => return Some(msg),
                    Err(e) => tracing::warn!(error = %e, "undecodable message from relay"),
                },
                Ok(_) => {}
                Err(e) => {
                    log_read_error(&e);
                    return None;
                }
            }
        }
    }
}

fn log_read_error(e: &tungstenite::Error) {
    match e {
        tungstenite::Error::Io(io)
            if matches!(io.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
        other => tracing::debug!(error = %other, "relay connection closed"),
    }
}
