// Session membership and fan-out.
//
// A `Session` is a named set of client ids. It has no owner: it lives in the
// `Registry` for as long as it has at least one member, and the relay
// removes it the moment the last member leaves. Members are kept in join
// order so that every recipient of a roster broadcast sees the same list in
// the same order.
//
// Sessions never hold clients directly. `join`/`leave` take the client to
// keep its back-reference in step with membership; broadcasts take the
// relay's `ClientTable` and resolve member ids through it.

use presence_protocol::{ClientId, PeerInfo, Peers, ServerMessage, SessionId};

use crate::client::{Client, ClientTable};

/// Which members of a session receive a broadcast.
#[derive(Clone, Copy, Debug)]
pub enum Audience<'a> {
    Everyone,
    AllExcept(&'a ClientId),
}

impl Audience<'_> {
    fn includes(&self, id: &ClientId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(excluded) => *excluded != id,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    members: Vec<ClientId>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            members: Vec::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Add `client` to the session and point its back-reference here.
    /// Joining twice leaves a single membership entry.
    pub fn join(&mut self, client: &mut Client) {
        if !self.contains(client.id()) {
            self.members.push(client.id().clone());
        }
        client.set_session(Some(self.id.clone()));
    }

    /// Remove `client` from the session and clear its back-reference.
    /// No-op if it is not a member.
    pub fn leave(&mut self, client: &mut Client) {
        let Some(pos) = self.members.iter().position(|m| m == client.id()) else {
            return;
        };
        self.members.remove(pos);
        if client.session() == Some(&self.id) {
            client.set_session(None);
        }
    }

    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Send `msg` to the members selected by `audience`.
    pub fn broadcast(
        &self,
        clients: &mut ClientTable,
        msg: &ServerMessage,
        audience: Audience<'_>,
    ) {
        match serde_json::to_string(msg) {
            Ok(payload) => self.broadcast_text(clients, &payload, audience),
            Err(e) => tracing::warn!(session = %self.id, error = %e, "failed to encode broadcast"),
        }
    }

    /// Send an already-encoded message to the members selected by
    /// `audience`, byte for byte.
    pub fn broadcast_text(&self, clients: &mut ClientTable, payload: &str, audience: Audience<'_>) {
        for id in self.members.iter().filter(|id| audience.includes(id)) {
            if let Some(client) = clients.get_mut(id) {
                client.deliver(payload);
            }
        }
    }

    /// Current members with their states, in join order.
    pub fn roster(&self, clients: &ClientTable) -> Vec<PeerInfo> {
        self.members
            .iter()
            .filter_map(|id| clients.get(id))
            .map(|client| PeerInfo {
                id: client.id().clone(),
                state: client.state().cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Send every member a `session-broadcast` whose `you` is that member.
    pub fn broadcast_roster(&self, clients: &mut ClientTable) {
        let roster = self.roster(clients);
        for id in &self.members {
            if let Some(client) = clients.get_mut(id) {
                client.send(&ServerMessage::SessionBroadcast {
                    peers: Peers {
                        you: id.clone(),
                        clients: roster.clone(),
                    },
                });
            }
        }
    }
}
