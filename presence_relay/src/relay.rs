// Message dispatch: the relay's protocol state machine.
//
// `Relay` owns the session `Registry` and the table of live clients, and
// applies one inbound event at a time: a new connection, a frame from a
// client, or a disconnect. `server.rs` drives it from a single thread, so
// nothing here locks.
//
// Per-connection protocol:
// - `create-session`: new session under a generated id, sender joins it,
//   sender's state is replaced, `session-created` goes to the sender only.
// - `join-session`: session by id (created if absent), sender joins, state
//   is replaced, every member (sender included) gets a roster.
// - `state-update`: one property of the sender's state changes and the
//   update is relayed to every other member. A frame off the wire is
//   forwarded as received, unknown fields included. Refused outside a
//   session.
// - disconnect: sender leaves; an emptied session is deleted at once,
//   otherwise the remaining members get a roster.
//
// A client is in at most one session. Creating or joining a different
// session first leaves the current one, with the same cleanup as a
// disconnect.
//
// Errors never escape a connection. Each is logged, answered with an
// `error` message to the sender, and returned to the caller for tests.

use presence_ids::IdGenerator;
use presence_protocol::{
    ClientId, ClientMessage, ClientState, PropertyUpdate, ServerMessage, SessionId,
};

use crate::client::{Client, ClientTable, Transport};
use crate::error::RelayError;
use crate::registry::Registry;
use crate::session::{Audience, Session};

pub struct Relay {
    registry: Registry,
    clients: ClientTable,
    ids: IdGenerator,
}

impl Relay {
    /// A relay whose session and client ids come from fresh entropy.
    pub fn new() -> Self {
        Self::with_generators(IdGenerator::from_entropy(), IdGenerator::from_entropy())
    }

    /// A relay with reproducible ids.
    pub fn seeded(seed: u64) -> Self {
        // Distinct streams so session and client ids don't mirror each other.
        Self::with_generators(
            IdGenerator::seeded(seed),
            IdGenerator::seeded(seed ^ 0xc1e4_7a11_d5e5_5105),
        )
    }

    pub fn with_generators(session_ids: IdGenerator, client_ids: IdGenerator) -> Self {
        Self {
            registry: Registry::new(session_ids),
            clients: ClientTable::new(),
            ids: client_ids,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn client(&self, id: &ClientId) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// The session `id` currently belongs to, if any.
    pub fn session_of(&self, id: &ClientId) -> Option<&Session> {
        let session_id = self.clients.get(id)?.session()?;
        self.registry.get(session_id)
    }

    /// Register a new connection and return its id.
    pub fn connect(&mut self, transport: Box<dyn Transport>) -> ClientId {
        let id = loop {
            let candidate = ClientId(self.ids.next_id());
            if !self.clients.contains_key(&candidate) {
                break candidate;
            }
        };
        tracing::debug!(client = %id, "client connected");
        self.clients
            .insert(id.clone(), Client::new(id.clone(), transport));
        id
    }

    /// Decode and dispatch one text frame.
    pub fn handle_frame(&mut self, client_id: &ClientId, text: &str) -> Result<(), RelayError> {
        let result = serde_json::from_str::<ClientMessage>(text)
            .map_err(RelayError::from)
            .and_then(|message| self.dispatch(client_id, message, Some(text)));
        if let Err(e) = &result {
            self.reject(client_id, e);
        }
        result
    }

    /// Dispatch an already-decoded message. A relayed `state-update` is
    /// re-encoded from its fields.
    pub fn handle_message(
        &mut self,
        client_id: &ClientId,
        message: ClientMessage,
    ) -> Result<(), RelayError> {
        let result = self.dispatch(client_id, message, None);
        if let Err(e) = &result {
            self.reject(client_id, e);
        }
        result
    }

    /// Forget a closed connection and tidy up its session.
    pub fn disconnect(&mut self, client_id: &ClientId) {
        self.leave_current_session(client_id);
        if self.clients.remove(client_id).is_some() {
            tracing::debug!(client = %client_id, "client disconnected");
        }
    }

    /// Send `msg` to every other member of the sender's session. No-op if
    /// the sender is not in a session.
    pub fn broadcast_from(&mut self, client_id: &ClientId, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(text) => self.forward_from(client_id, &text),
            Err(e) => tracing::warn!(client = %client_id, error = %e, "failed to encode broadcast"),
        }
    }

    /// Like `broadcast_from`, for a message that is already encoded.
    pub fn forward_from(&mut self, client_id: &ClientId, text: &str) {
        let Some(session_id) = self
            .clients
            .get(client_id)
            .and_then(Client::session)
            .cloned()
        else {
            return;
        };
        if let Some(session) = self.registry.get(&session_id) {
            session.broadcast_text(&mut self.clients, text, Audience::AllExcept(client_id));
        }
    }

    /// `raw` is the frame the message was decoded from, if any.
    fn dispatch(
        &mut self,
        client_id: &ClientId,
        message: ClientMessage,
        raw: Option<&str>,
    ) -> Result<(), RelayError> {
        match message {
            ClientMessage::CreateSession { state } => self.create_session(client_id, state),
            ClientMessage::JoinSession { id, state } => self.join_session(client_id, id, state),
            ClientMessage::StateUpdate {
                fragment,
                state: PropertyUpdate(property, value),
            } => self.update_state(client_id, fragment, property, value, raw),
        }
    }

    fn create_session(
        &mut self,
        client_id: &ClientId,
        state: ClientState,
    ) -> Result<(), RelayError> {
        self.require_client(client_id)?;
        let session_id = self.registry.create(None)?.id().clone();
        self.leave_current_session(client_id);

        let (Some(session), Some(client)) = (
            self.registry.get_mut(&session_id),
            self.clients.get_mut(client_id),
        ) else {
            return Err(RelayError::UnknownClient(client_id.clone()));
        };
        session.join(client);
        client.replace_state(state);
        client.send(&ServerMessage::SessionCreated {
            id: session_id.clone(),
        });
        tracing::info!(client = %client_id, session = %session_id, "client created session");
        Ok(())
    }

    fn join_session(
        &mut self,
        client_id: &ClientId,
        session_id: SessionId,
        state: ClientState,
    ) -> Result<(), RelayError> {
        let current = self.require_client(client_id)?.session().cloned();
        if current.as_ref() != Some(&session_id) {
            self.leave_current_session(client_id);
        }

        let session = self.registry.get_or_create(session_id);
        let client = self
            .clients
            .get_mut(client_id)
            .ok_or_else(|| RelayError::UnknownClient(client_id.clone()))?;
        session.join(client);
        client.replace_state(state);
        tracing::info!(
            client = %client_id,
            session = %session.id(),
            members = session.len(),
            "client joined session"
        );
        session.broadcast_roster(&mut self.clients);
        Ok(())
    }

    fn update_state(
        &mut self,
        client_id: &ClientId,
        fragment: String,
        property: String,
        value: serde_json::Value,
        raw: Option<&str>,
    ) -> Result<(), RelayError> {
        let client = self
            .clients
            .get_mut(client_id)
            .ok_or_else(|| RelayError::UnknownClient(client_id.clone()))?;
        if client.session().is_none() {
            return Err(RelayError::NotInSession);
        }
        client.update_state(&fragment, &property, value.clone())?;
        tracing::debug!(client = %client_id, %fragment, %property, "state updated");

        match raw {
            Some(text) => self.forward_from(client_id, text),
            None => {
                let update = ServerMessage::StateUpdate {
                    fragment,
                    state: PropertyUpdate(property, value),
                };
                self.broadcast_from(client_id, &update);
            }
        }
        Ok(())
    }

    /// Take `client_id` out of its session, deleting the session if that
    /// emptied it and re-announcing the roster otherwise.
    fn leave_current_session(&mut self, client_id: &ClientId) {
        let Some(client) = self.clients.get_mut(client_id) else {
            return;
        };
        let Some(session_id) = client.session().cloned() else {
            return;
        };
        let Some(session) = self.registry.get_mut(&session_id) else {
            // Dangling back-reference; nothing left to announce to.
            client.set_session(None);
            return;
        };
        session.leave(client);
        tracing::info!(client = %client_id, session = %session_id, "client left session");
        if session.is_empty() {
            self.registry.remove(&session_id);
        } else {
            session.broadcast_roster(&mut self.clients);
        }
    }

    fn require_client(&self, client_id: &ClientId) -> Result<&Client, RelayError> {
        self.clients
            .get(client_id)
            .ok_or_else(|| RelayError::UnknownClient(client_id.clone()))
    }

    /// Report `err` to the client whose message caused it.
    fn reject(&mut self, client_id: &ClientId, err: &RelayError) {
        tracing::warn!(client = %client_id, error = %err, "message rejected");
        if let Some(client) = self.clients.get_mut(client_id) {
            client.send(&ServerMessage::Error {
                reason: err.to_string(),
            });
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use presence_protocol::Peers;

    use super::*;
    use crate::client::ConnectionPhase;
    use crate::test_support::Outbox;

    fn state(value: Value) -> ClientState {
        ClientState::try_from(value).unwrap()
    }

    fn connect(relay: &mut Relay) -> (ClientId, Outbox) {
        let outbox = Outbox::default();
        let id = relay.connect(Box::new(outbox.clone()));
        (id, outbox)
    }

    fn create(relay: &mut Relay, id: &ClientId, outbox: &Outbox, s: Value) -> SessionId {
        relay
            .handle_message(id, ClientMessage::CreateSession { state: state(s) })
            .unwrap();
        match outbox.take().as_slice() {
            [ServerMessage::SessionCreated { id }] => id.clone(),
            other => panic!("expected SessionCreated, got {other:?}"),
        }
    }

    fn join(relay: &mut Relay, id: &ClientId, session: &SessionId, s: Value) {
        relay
            .handle_message(
                id,
                ClientMessage::JoinSession {
                    id: session.clone(),
                    state: state(s),
                },
            )
            .unwrap();
    }

    fn update(
        relay: &mut Relay,
        id: &ClientId,
        fragment: &str,
        property: &str,
        value: Value,
    ) -> Result<(), RelayError> {
        relay.handle_message(
            id,
            ClientMessage::StateUpdate {
                fragment: fragment.into(),
                state: PropertyUpdate(property.into(), value),
            },
        )
    }

    fn only_roster(outbox: &Outbox) -> Peers {
        match outbox.take().as_slice() {
            [ServerMessage::SessionBroadcast { peers }] => peers.clone(),
            other => panic!("expected one SessionBroadcast, got {other:?}"),
        }
    }

    #[test]
    fn connect_assigns_unique_ids() {
        let mut relay = Relay::seeded(1);
        let ids: Vec<ClientId> = (0..50).map(|_| connect(&mut relay).0).collect();
        let unique: std::collections::BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 50);
        assert_eq!(relay.client_count(), 50);
    }

    #[test]
    fn create_session_replies_to_sender_only() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"x": 0}));

        assert_eq!(session.as_str().len(), presence_ids::ID_LENGTH);
        assert!(relay.registry().contains(&session));
        let client = relay.client(&a).unwrap();
        assert_eq!(client.phase(), ConnectionPhase::InSession);
        assert_eq!(client.session(), Some(&session));
        assert_eq!(client.state(), Some(&state(json!({"x": 0}))));
    }

    #[test]
    fn join_session_broadcasts_roster_to_everyone() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let (c, outbox_c) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"x": 0}));
        join(&mut relay, &b, &session, json!({"x": 1}));
        outbox_a.take();
        outbox_b.take();

        join(&mut relay, &c, &session, json!({"x": 2}));

        for (id, outbox) in [(&a, &outbox_a), (&b, &outbox_b), (&c, &outbox_c)] {
            let peers = only_roster(outbox);
            assert_eq!(&peers.you, id);
            let ids: Vec<&ClientId> = peers.clients.iter().map(|p| &p.id).collect();
            assert_eq!(ids, vec![&a, &b, &c]);
            assert_eq!(peers.clients[2].state, state(json!({"x": 2})));
        }
    }

    #[test]
    fn join_unknown_id_creates_session() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let session = SessionId::from("my-room");
        join(&mut relay, &a, &session, json!({}));

        assert!(relay.registry().contains(&session));
        let peers = only_roster(&outbox_a);
        assert_eq!(peers.you, a);
        assert_eq!(peers.clients.len(), 1);
    }

    #[test]
    fn state_update_relayed_to_others_only() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let (c, outbox_c) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"pos": {"x": 0, "y": 0}}));
        join(&mut relay, &b, &session, json!({}));
        join(&mut relay, &c, &session, json!({}));
        for outbox in [&outbox_a, &outbox_b, &outbox_c] {
            outbox.take();
        }

        update(&mut relay, &a, "pos", "x", json!(5)).unwrap();

        let expected = ServerMessage::StateUpdate {
            fragment: "pos".into(),
            state: PropertyUpdate("x".into(), json!(5)),
        };
        assert!(outbox_a.take().is_empty(), "sender must not get an echo");
        assert_eq!(outbox_b.take(), vec![expected.clone()]);
        assert_eq!(outbox_c.take(), vec![expected]);
        assert_eq!(
            relay.client(&a).unwrap().state(),
            Some(&state(json!({"pos": {"x": 5, "y": 0}})))
        );
    }

    #[test]
    fn state_update_creates_missing_fragment() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        create(&mut relay, &a, &outbox_a, json!({}));

        update(&mut relay, &a, "cursor", "x", json!(10)).unwrap();
        assert_eq!(
            relay.client(&a).unwrap().state(),
            Some(&state(json!({"cursor": {"x": 10}})))
        );
    }

    #[test]
    fn state_update_on_scalar_fragment_reports_error() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"name": "Ayla"}));
        join(&mut relay, &b, &session, json!({}));
        outbox_a.take();
        outbox_b.take();

        let err = update(&mut relay, &a, "name", "first", json!("A")).unwrap_err();
        assert!(matches!(err, RelayError::State(_)));
        assert!(matches!(outbox_a.take().as_slice(), [ServerMessage::Error { .. }]));
        assert!(outbox_b.take().is_empty(), "refused update must not be relayed");
    }

    #[test]
    fn state_update_outside_session_is_refused() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);

        let err = update(&mut relay, &a, "pos", "x", json!(1)).unwrap_err();
        assert!(matches!(err, RelayError::NotInSession));
        match outbox_a.take().as_slice() {
            [ServerMessage::Error { reason }] => assert_eq!(reason, "not in a session"),
            other => panic!("expected Error, got {other:?}"),
        }
        assert!(relay.client(&a).unwrap().state().is_none());
    }

    #[test]
    fn malformed_frame_is_reported_and_isolated() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({}));
        join(&mut relay, &b, &session, json!({}));
        outbox_a.take();
        outbox_b.take();

        for bad in ["not json", r#"{"type":"explode"}"#, r#"{"id":"x"}"#] {
            let err = relay.handle_frame(&b, bad).unwrap_err();
            assert!(matches!(err, RelayError::MalformedMessage(_)));
        }
        assert_eq!(outbox_b.take().len(), 3);
        assert!(outbox_a.take().is_empty());
        assert_eq!(relay.session_of(&b).map(Session::len), Some(2));
    }

    #[test]
    fn frame_decodes_wire_json() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        relay
            .handle_frame(&a, r#"{"type":"create-session","state":{"x":0}}"#)
            .unwrap();
        assert!(matches!(
            outbox_a.take().as_slice(),
            [ServerMessage::SessionCreated { .. }]
        ));
    }

    #[test]
    fn scalar_state_is_rejected_as_malformed() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let err = relay
            .handle_frame(&a, r#"{"type":"create-session","state":5}"#)
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedMessage(_)));
        assert!(matches!(outbox_a.take().as_slice(), [ServerMessage::Error { .. }]));
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn relayed_frame_is_forwarded_verbatim() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({}));
        join(&mut relay, &b, &session, json!({}));
        outbox_a.take();
        outbox_b.take();

        let frame = r#"{"type":"state-update","fragment":"pos","state":["x",5,"extra"],"seq":7}"#;
        relay.handle_frame(&a, frame).unwrap();

        assert_eq!(outbox_b.take_text(), vec![frame.to_owned()]);
        assert!(outbox_a.take_text().is_empty());
        assert_eq!(
            relay.client(&a).unwrap().state(),
            Some(&state(json!({"pos": {"x": 5}})))
        );
    }

    #[test]
    fn refused_frame_is_not_forwarded() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"name": "Ayla"}));
        join(&mut relay, &b, &session, json!({}));
        outbox_a.take();
        outbox_b.take();

        let frame = r#"{"type":"state-update","fragment":"name","state":["first","A"]}"#;
        assert!(relay.handle_frame(&a, frame).is_err());
        assert!(outbox_b.take_text().is_empty());
    }

    #[test]
    fn last_leave_deletes_session() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({}));

        relay.disconnect(&a);

        assert!(!relay.registry().contains(&session));
        assert!(relay.registry().is_empty());
        assert_eq!(relay.client_count(), 0);
    }

    #[test]
    fn disconnect_announces_roster_to_survivors() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"x": 0}));
        join(&mut relay, &b, &session, json!({"x": 1}));
        outbox_a.take();
        outbox_b.take();

        relay.disconnect(&a);

        let peers = only_roster(&outbox_b);
        assert_eq!(peers.you, b);
        assert_eq!(peers.clients.len(), 1);
        assert_eq!(peers.clients[0].id, b);
        assert!(relay.registry().contains(&session));
    }

    #[test]
    fn disconnect_unjoined_client_is_quiet() {
        let mut relay = Relay::seeded(1);
        let (a, _) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let (c, outbox_c) = connect(&mut relay);
        join(&mut relay, &b, &"room".into(), json!({}));
        join(&mut relay, &c, &"room".into(), json!({}));
        outbox_b.take();
        outbox_c.take();

        relay.disconnect(&a);
        assert!(outbox_b.take().is_empty());
        assert!(outbox_c.take().is_empty());
        assert_eq!(relay.registry().len(), 1);
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        create(&mut relay, &a, &outbox_a, json!({}));
        relay.disconnect(&a);
        relay.disconnect(&a);
        assert_eq!(relay.client_count(), 0);
    }

    #[test]
    fn emptied_session_is_not_revived() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"x": 0}));
        relay.disconnect(&a);

        join(&mut relay, &b, &session, json!({"x": 1}));

        let peers = only_roster(&outbox_b);
        assert_eq!(peers.clients.len(), 1, "old members must not reappear");
        assert_eq!(peers.clients[0].id, b);
    }

    #[test]
    fn joining_another_session_leaves_the_first() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        let first = create(&mut relay, &a, &outbox_a, json!({}));
        join(&mut relay, &b, &first, json!({}));
        outbox_a.take();
        outbox_b.take();

        join(&mut relay, &b, &"second".into(), json!({}));

        // a sees b leave the first session.
        let peers = only_roster(&outbox_a);
        assert_eq!(peers.clients.len(), 1);
        // b sees only itself in the second.
        let peers = only_roster(&outbox_b);
        assert_eq!(peers.clients.len(), 1);
        assert_eq!(relay.session_of(&b).map(|s| s.id().clone()), Some("second".into()));
        assert_eq!(relay.registry().get(&first).map(Session::len), Some(1));
    }

    #[test]
    fn creating_a_new_session_abandons_the_old_one() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let first = create(&mut relay, &a, &outbox_a, json!({}));
        let second = create(&mut relay, &a, &outbox_a, json!({}));

        assert_ne!(first, second);
        assert!(!relay.registry().contains(&first), "emptied session is deleted");
        assert!(relay.registry().contains(&second));
    }

    #[test]
    fn rejoining_same_session_keeps_single_membership() {
        let mut relay = Relay::seeded(1);
        let (a, outbox_a) = connect(&mut relay);
        let session = create(&mut relay, &a, &outbox_a, json!({"x": 0}));
        join(&mut relay, &a, &session, json!({"x": 9}));

        let peers = only_roster(&outbox_a);
        assert_eq!(peers.clients.len(), 1);
        assert_eq!(peers.clients[0].state, state(json!({"x": 9})));
        assert!(relay.registry().contains(&session));
    }

    #[test]
    fn broadcast_from_unjoined_client_is_noop() {
        let mut relay = Relay::seeded(1);
        let (a, _) = connect(&mut relay);
        let (b, outbox_b) = connect(&mut relay);
        join(&mut relay, &b, &"room".into(), json!({}));
        outbox_b.take();

        relay.broadcast_from(&a, &ServerMessage::Error { reason: "x".into() });
        assert!(outbox_b.take().is_empty());
    }

    #[test]
    fn messages_from_unknown_client_fail_quietly() {
        let mut relay = Relay::seeded(1);
        let ghost = ClientId::from("ghost");
        let err = relay
            .handle_message(&ghost, ClientMessage::CreateSession { state: ClientState::new() })
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownClient(_)));
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn every_live_session_has_members() {
        let mut relay = Relay::seeded(3);
        let mut rng = presence_ids::IdRng::new(3);
        let mut live: Vec<(ClientId, Outbox)> = Vec::new();
        let rooms = ["r0", "r1", "r2"];
        for _ in 0..300 {
            match rng.range_usize(0, 4) {
                0 => live.push(connect(&mut relay)),
                1 if !live.is_empty() => {
                    let (id, _) = live.remove(rng.range_usize(0, live.len()));
                    relay.disconnect(&id);
                }
                2 if !live.is_empty() => {
                    let (id, _) = &live[rng.range_usize(0, live.len())];
                    let room = rooms[rng.range_usize(0, rooms.len())];
                    join(&mut relay, id, &room.into(), json!({}));
                }
                _ if !live.is_empty() => {
                    let (id, _) = &live[rng.range_usize(0, live.len())];
                    let _ = update(&mut relay, id, "pos", "x", json!(1));
                }
                _ => {}
            }
            for session_id in relay.registry().session_ids() {
                let session = relay.registry().get(session_id).unwrap();
                assert!(!session.is_empty(), "empty session {session_id} left behind");
                for member in session.members() {
                    let client = relay.client(member).expect("member is live");
                    assert_eq!(client.session(), Some(session_id));
                }
            }
        }
    }
}
