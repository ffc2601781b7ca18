// Per-client presence state.
//
// A client's state is a two-level map: fragment name → JSON object of
// properties. The relay never interprets property values; it only knows how
// to replace one property inside one fragment (`state-update`). Clients
// replace the whole map when they create or join a session.
//
// Top-level fragment values are arbitrary JSON so clients can carry plain
// fields (`"name": "Ayla"`) alongside structured ones (`"pos": {"x": 0}`).
// Only fragments addressed by an update need to be objects; an update that
// names a missing fragment creates it, and one that names a non-object
// fragment is refused without touching the state.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fragment-keyed presence state of one client.
///
/// On the wire this is a JSON object or `null`. A top-level state that is
/// any other JSON value (a number, string, or array) fails to decode, so the
/// relay rejects the carrying message as malformed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClientState {
    fragments: BTreeMap<String, Value>,
}

/// Why a property update could not be applied.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("fragment `{fragment}` is not an object")]
    FragmentNotObject { fragment: String },
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `state[fragment][property] = value`, creating the fragment if
    /// it does not exist yet. Other properties of the fragment are kept.
    pub fn set_property(
        &mut self,
        fragment: &str,
        property: &str,
        value: Value,
    ) -> Result<(), StateError> {
        let slot = self
            .fragments
            .entry(fragment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        match slot {
            Value::Object(properties) => {
                properties.insert(property.to_owned(), value);
                Ok(())
            }
            _ => Err(StateError::FragmentNotObject {
                fragment: fragment.to_owned(),
            }),
        }
    }

    pub fn fragment(&self, fragment: &str) -> Option<&Value> {
        self.fragments.get(fragment)
    }

    pub fn property(&self, fragment: &str, property: &str) -> Option<&Value> {
        self.fragments.get(fragment)?.as_object()?.get(property)
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }
}

impl From<BTreeMap<String, Value>> for ClientState {
    fn from(fragments: BTreeMap<String, Value>) -> Self {
        Self { fragments }
    }
}

impl TryFrom<Value> for ClientState {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

// `null` is accepted as "no state" so clients that send `state: null` (or
// omit it, via `#[serde(default)]` on the message fields) start empty.
impl<'de> Deserialize<'de> for ClientState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fragments = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
        Ok(Self {
            fragments: fragments.unwrap_or_default(),
        })
    }
}
