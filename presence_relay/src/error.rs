// Errors raised while dispatching client messages.
//
// Every variant is scoped to one connection: the relay reports it back to
// the offending client as an `error` message and carries on. Nothing here
// is fatal to the process.

use presence_protocol::{ClientId, SessionId, StateError};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A session with this id is already live.
    #[error("session {0} already exists")]
    DuplicateSession(SessionId),

    /// The frame is not JSON, or not a known message type.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// `state-update` from a client that has not created or joined a session.
    #[error("not in a session")]
    NotInSession,

    #[error(transparent)]
    State(#[from] StateError),

    /// The connection is gone (or never existed).
    #[error("unknown client {0}")]
    UnknownClient(ClientId),
}
