// presence_relay — session relay for shared presence state.
//
// Clients connect over WebSocket, create or join a named session, and
// publish a small state blob (cursor position, selection, display name,
// ...). The
// relay keeps each client's latest state and rebroadcasts every change to
// the other members of its session. It never interprets the state.
//
// Module overview:
// - `registry.rs`:   Session directory — create, look up, and delete
//                    sessions by id.
// - `session.rs`:    Membership of one session and fan-out to its members
//                    (plain broadcasts and personalized rosters).
// - `client.rs`:     One connected peer: id, write transport, state, and the
//                    id of its session.
// - `relay.rs`:      Message dispatch. Owns the registry and the client
//                    table and applies one event at a time.
// - `server.rs`:     WebSocket listener, connection threads (one per client),
//                    and the main event loop that drives `Relay`.
// - `net_client.rs`: Blocking WebSocket client, for tests and embedders.
// - `config.rs`:     `RelayConfig` and its defaults.
// - `error.rs`:      `RelayError`, the per-connection error type.
//
// Dependencies: `presence_protocol` (messages, state), `tungstenite`
// (WebSocket transport), and `presence_ids` (id generation).

pub mod client;
pub mod config;
pub mod error;
pub mod net_client;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::RelayConfig;
pub use error::RelayError;
pub use relay::Relay;
pub use server::{RelayHandle, start_relay};
