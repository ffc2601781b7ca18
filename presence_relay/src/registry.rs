// Directory of live sessions.
//
// The `Registry` maps session ids to `Session`s. It is a plain value owned
// by the `Relay`. There is no process-wide instance, and tests run any
// number of independent registries side by side.
//
// Invariant (maintained by the relay, not here): every session in the
// registry has at least one member. The registry only stores; the relay
// removes a session as soon as its last member leaves.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use presence_ids::IdGenerator;
use presence_protocol::SessionId;

use crate::error::RelayError;
use crate::session::Session;

pub struct Registry {
    sessions: BTreeMap<SessionId, Session>,
    ids: IdGenerator,
}

impl Registry {
    /// An empty registry that names new sessions with `ids`.
    pub fn new(ids: IdGenerator) -> Self {
        Self {
            sessions: BTreeMap::new(),
            ids,
        }
    }

    /// Insert a new, empty session. Uses `id` if given, otherwise a fresh
    /// generated id. Fails if the id is already live; generated ids are not
    /// retried.
    pub fn create(&mut self, id: Option<SessionId>) -> Result<&mut Session, RelayError> {
        let id = id.unwrap_or_else(|| SessionId(self.ids.next_id()));
        match self.sessions.entry(id) {
            Entry::Occupied(entry) => Err(RelayError::DuplicateSession(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::info!(session = %entry.key(), "session created");
                let session = Session::new(entry.key().clone());
                Ok(entry.insert(session))
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// The live session named `id`, or a new empty one under exactly that
    /// id.
    pub fn get_or_create(&mut self, id: SessionId) -> &mut Session {
        match self.sessions.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!(session = %entry.key(), "session created on join");
                let session = Session::new(entry.key().clone());
                entry.insert(session)
            }
        }
    }

    /// Drop the session named `id`. No-op if absent.
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            tracing::info!(session = %id, "session closed");
        }
        removed
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &SessionId> {
        self.sessions.keys()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(IdGenerator::from_entropy())
    }
}
