// Test-only peer for end-to-end relay tests.
//
// Wraps the real `NetClient` (from `presence_relay::net_client`) with
// synchronous, test-friendly helpers: send a message, then block until the
// expected reply arrives or a timeout fails the test. All networking goes
// through the same code paths a Rust embedder would use.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use presence_protocol::{ClientState, Peers, PropertyUpdate, ServerMessage, SessionId};
use presence_relay::net_client::NetClient;
use serde_json::Value;

/// Default timeout for blocking waits.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `assert_quiet` listens before concluding nothing is coming.
const QUIET_WINDOW: Duration = Duration::from_millis(150);

pub struct TestPeer {
    client: NetClient,
}

impl TestPeer {
    pub fn connect(addr: SocketAddr) -> Self {
        let client = NetClient::connect(addr).expect("TestPeer::connect failed");
        Self { client }
    }

    /// Create a session and wait for its id.
    pub fn create_session(&mut self, state: Value) -> SessionId {
        self.client
            .create_session(to_state(state))
            .expect("create_session failed");
        match self.recv() {
            ServerMessage::SessionCreated { id } => id,
            other => panic!("expected SessionCreated, got {other:?}"),
        }
    }

    /// Join a session and wait for the roster that confirms it.
    pub fn join_session(&mut self, id: &SessionId, state: Value) -> Peers {
        self.client
            .join_session(id.clone(), to_state(state))
            .expect("join_session failed");
        self.expect_roster()
    }

    pub fn update_state(&mut self, fragment: &str, property: &str, value: Value) {
        self.client
            .update_state(fragment, property, value)
            .expect("update_state failed");
    }

    pub fn send_raw(&mut self, text: &str) {
        self.client.send_raw(text).expect("send_raw failed");
    }

    /// Block for the next message of any kind.
    pub fn recv(&mut self) -> ServerMessage {
        self.client
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for a server message")
    }

    pub fn expect_roster(&mut self) -> Peers {
        match self.recv() {
            ServerMessage::SessionBroadcast { peers } => peers,
            other => panic!("expected SessionBroadcast, got {other:?}"),
        }
    }

    pub fn expect_update(&mut self) -> (String, PropertyUpdate) {
        match self.recv() {
            ServerMessage::StateUpdate { fragment, state } => (fragment, state),
            other => panic!("expected StateUpdate, got {other:?}"),
        }
    }

    pub fn expect_error(&mut self) -> String {
        match self.recv() {
            ServerMessage::Error { reason } => reason,
            other => panic!("expected Error, got {other:?}"),
        }
    }

    /// Fail if any message arrives within a short window.
    pub fn assert_quiet(&mut self) {
        let start = Instant::now();
        while start.elapsed() < QUIET_WINDOW {
            let pending = self.client.poll();
            assert!(pending.is_empty(), "unexpected messages: {pending:?}");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }
}

fn to_state(value: Value) -> ClientState {
    ClientState::try_from(value).expect("test state must be a JSON object or null")
}
