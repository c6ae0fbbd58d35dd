// ── Persisted object/state store contract ──
//
// A hierarchical namespace of objects addressed by dotted identifiers.
// Objects carry metadata (`common`) and adapter-private data (`native`);
// states carry a value tagged with an acknowledge flag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::error::Error;

/// A stored value plus its acknowledge flag.
///
/// `ack == true` means the value reflects the device side; `ack == false`
/// is a command from some other writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub val: Value,
    pub ack: bool,
    pub ts: DateTime<Utc>,
}

impl State {
    pub fn new(val: Value, ack: bool) -> Self {
        Self {
            val,
            ack,
            ts: Utc::now(),
        }
    }

    /// An acknowledged (device-sourced) value.
    pub fn acknowledged(val: Value) -> Self {
        Self::new(val, true)
    }

    /// An unacknowledged value, i.e. a command.
    pub fn command(val: Value) -> Self {
        Self::new(val, false)
    }
}

/// A state change delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub id: String,
    pub state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectKind {
    Folder,
    Channel,
    State,
}

/// Metadata shared by every object type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectCommon {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Value type of a state object ("boolean", "number", "string").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub common: ObjectCommon,
    #[serde(default)]
    pub native: Map<String, Value>,
}

/// Partial update applied by [`StateRepository::extend_object`].
///
/// `common` replaces the stored metadata when present; `native` keys are
/// merged into the existing map, leaving other keys untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPatch {
    pub common: Option<ObjectCommon>,
    pub native: Map<String, Value>,
}

impl ObjectPatch {
    /// Apply this patch to `object` in place.
    pub fn apply(self, object: &mut StoredObject) {
        if let Some(common) = self.common {
            object.common = common;
        }
        for (key, value) in self.native {
            object.native.insert(key, value);
        }
    }
}

/// Repository interface over the host's object storage.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn get_object(&self, id: &str) -> Result<Option<StoredObject>, Error>;

    /// Create the object unless one already exists. Returns `true` when
    /// the object was created.
    async fn set_object_not_exists(&self, id: &str, object: StoredObject) -> Result<bool, Error>;

    /// Merge `patch` into an existing object.
    async fn extend_object(&self, id: &str, patch: ObjectPatch) -> Result<(), Error>;

    /// Every object whose id starts with `prefix`, ordered by id.
    async fn objects_with_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredObject)>, Error>;

    async fn get_state(&self, id: &str) -> Result<Option<State>, Error>;

    async fn set_state(&self, id: &str, state: State) -> Result<(), Error>;

    /// Subscribe to state changes for ids starting with `prefix`.
    fn subscribe_states(&self, prefix: &str) -> mpsc::UnboundedReceiver<StateChange>;
}
