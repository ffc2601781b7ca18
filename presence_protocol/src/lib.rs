// presence_protocol — wire protocol for the presence relay.
//
// This crate defines the message types and state model used by the relay
// (`presence_relay`) and its clients. It is shared between both sides. On
// the wire each message is one WebSocket text frame holding a JSON object.
//
// Module overview:
// - `types.rs`:    Id newtypes — `SessionId`, `ClientId`.
// - `state.rs`:    `ClientState`, the fragment → property map each client
//                  publishes, and the single mutation the relay applies to it.
// - `message.rs`:  Client-to-relay and relay-to-client message enums, plus the
//                  roster structs (`Peers`, `PeerInfo`).
//
// Design decisions:
// - **JSON with a `type` tag.** Messages are self-describing records so
//   browser-side clients can build them by hand.
// - **State values are opaque.** The relay never validates what clients put
//   in their state; it only routes it.

pub mod message;
pub mod state;
pub mod types;

pub use message::{ClientMessage, PeerInfo, Peers, PropertyUpdate, ServerMessage};
pub use state::{ClientState, StateError};
pub use types::{ClientId, SessionId};
