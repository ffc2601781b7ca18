// Protocol messages for client-relay communication.
//
// Every message is a JSON object tagged by a `type` field in kebab-case:
// - `ClientMessage`: sent by clients to the relay.
// - `ServerMessage`: sent by the relay to clients.
//
// `state-update` appears in both directions with the same shape. The relay
// applies it to the sender's state and forwards the sender's text unchanged
// to the other members of the sender's session, so unknown fields survive
// the trip.

use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::state::ClientState;
use crate::types::{ClientId, SessionId};

/// Messages sent by a client to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Open a new session under a relay-generated id and join it.
    CreateSession {
        #[serde(default)]
        state: ClientState,
    },
    /// Join the named session, creating it if nobody is in it.
    JoinSession {
        id: SessionId,
        #[serde(default)]
        state: ClientState,
    },
    /// Set one property of one fragment of the sender's state.
    StateUpdate {
        fragment: String,
        state: PropertyUpdate,
    },
}

/// Messages sent by the relay to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Reply to `create-session`, sent only to the creator.
    SessionCreated { id: SessionId },
    /// Full roster of the recipient's session.
    SessionBroadcast { peers: Peers },
    /// Another member changed a property.
    StateUpdate {
        fragment: String,
        state: PropertyUpdate,
    },
    /// The recipient's last message was refused.
    Error { reason: String },
}

/// `[property, value]` pair carried by `state-update`. Array elements past
/// the second are ignored when decoding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropertyUpdate(pub String, pub Value);

impl<'de> Deserialize<'de> for PropertyUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(PropertyUpdateVisitor)
    }
}

struct PropertyUpdateVisitor;

impl<'de> Visitor<'de> for PropertyUpdateVisitor {
    type Value = PropertyUpdate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a [property, value] array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PropertyUpdate, A::Error> {
        let property: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let value: Value = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(PropertyUpdate(property, value))
    }
}

/// Roster envelope. `clients` is identical for every recipient of one
/// broadcast; `you` is the recipient's own id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peers {
    pub you: ClientId,
    pub clients: Vec<PeerInfo>,
}

/// One session member as seen by its peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: ClientId,
    pub state: ClientState,
}
