// ── Runtime mapping store ──
//
// Index of entry id → `MappingRecord`, rebuilt in full from the persisted
// entries. The whole map is swapped in one `watch` send, so readers see
// either the previous or the new index, never a partial one.

use std::collections::BTreeMap;
use std::sync::Arc;

use knxlink_api::{StateRepository, StoredObject};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::import::persist::keys;
use crate::model::{AccessFlags, AddressStyle, ENTRY_NAMESPACE, GroupAddress, MappingRecord, TypeCode};

/// Immutable view of the index at one point in time.
pub type MappingSnapshot = Arc<BTreeMap<String, Arc<MappingRecord>>>;

/// Read-mostly index consulted by the sync engine.
pub struct MappingStore {
    snapshot: watch::Sender<MappingSnapshot>,
}

impl MappingStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self { snapshot }
    }

    /// Scan every persisted entry and replace the index. Returns the
    /// number of records.
    pub async fn rebuild(&self, repo: &dyn StateRepository) -> Result<usize, CoreError> {
        let prefix = format!("{ENTRY_NAMESPACE}.");
        let objects = repo.objects_with_prefix(&prefix).await?;

        let records: Vec<MappingRecord> = objects
            .iter()
            .filter_map(|(id, object)| record_from_object(id, object))
            .collect();
        debug!(scanned = objects.len(), records = records.len(), "mapping store rebuilt");

        let count = records.len();
        self.replace(records);
        Ok(count)
    }

    /// Replace the whole index.
    pub fn replace(&self, records: impl IntoIterator<Item = MappingRecord>) {
        let map: BTreeMap<_, _> = records
            .into_iter()
            .map(|r| (r.id.clone(), Arc::new(r)))
            .collect();
        // `send_replace` updates even with zero receivers.
        self.snapshot.send_replace(Arc::new(map));
    }

    pub fn get(&self, id: &str) -> Option<Arc<MappingRecord>> {
        self.snapshot.borrow().get(id).cloned()
    }

    /// Current index (cheap `Arc` clone).
    pub fn snapshot(&self) -> MappingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Records ordered by id.
    pub fn records(&self) -> Vec<Arc<MappingRecord>> {
        self.snapshot().values().cloned().collect()
    }

    /// Notified after every rebuild.
    pub fn subscribe(&self) -> watch::Receiver<MappingSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.borrow().is_empty()
    }
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconstruct a record from a persisted object.
///
/// Objects without a usable address are not bus entries and yield `None`.
pub fn record_from_object(id: &str, object: &StoredObject) -> Option<MappingRecord> {
    let address = match object.native.get(keys::ADDRESS)? {
        Value::String(text) => {
            let style = object
                .native
                .get(keys::ADDRESS_STYLE)
                .and_then(Value::as_str)
                .map_or(AddressStyle::ThreeLevel, AddressStyle::from_name);
            match GroupAddress::parse(text, style) {
                Ok(address) => address,
                Err(e) => {
                    warn!(id, error = %e, "persisted entry skipped");
                    return None;
                }
            }
        }
        Value::Number(n) => {
            let raw = n.as_u64().and_then(|v| u32::try_from(v).ok())?;
            GroupAddress::from_raw(raw)
        }
        _ => return None,
    };

    let type_code = object
        .native
        .get(keys::TYPE)
        .and_then(Value::as_str)
        .and_then(TypeCode::normalize);

    Some(MappingRecord {
        id: id.to_owned(),
        address,
        type_code,
        flags: flags_from_native(object.native.get(keys::FLAGS)),
    })
}

/// Missing `transmit` means true; the other flags default to false.
fn flags_from_native(value: Option<&Value>) -> AccessFlags {
    let flag = |key: &str, default: bool| {
        value
            .and_then(|v| v.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(default)
    };
    AccessFlags::new(
        flag("read", false),
        flag("write", false),
        flag("transmit", true),
        flag("update", false),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use knxlink_api::{MemoryRepository, ObjectCommon, ObjectKind};
    use serde_json::json;

    use super::*;

    fn object(native: Value) -> StoredObject {
        let Value::Object(native) = native else {
            panic!("native must be an object");
        };
        StoredObject {
            kind: ObjectKind::State,
            common: ObjectCommon::default(),
            native,
        }
    }

    #[test]
    fn reconstructs_record_in_persisted_style() {
        let record = record_from_object(
            "ga.x.3_400",
            &object(json!({
                "address": "3/400",
                "addressStyle": "TwoLevel",
                "dpt": "1.001",
                "flags": { "read": true, "write": true, "transmit": false, "update": false }
            })),
        )
        .unwrap();

        assert_eq!(record.address.raw(), (3 << 11) | 400);
        assert_eq!(record.type_code.unwrap().as_str(), "1.001");
        assert_eq!(record.flags, AccessFlags::new(true, true, false, false));
    }

    #[test]
    fn missing_transmit_defaults_true() {
        let record = record_from_object(
            "ga.a",
            &object(json!({ "address": "1/0/1", "flags": { "write": true } })),
        )
        .unwrap();
        assert_eq!(record.flags, AccessFlags::new(false, true, true, false));

        let bare = record_from_object("ga.b", &object(json!({ "address": 2049 }))).unwrap();
        assert_eq!(bare.flags, AccessFlags::unreferenced());
        assert_eq!(bare.address.raw(), 2049);
    }

    #[test]
    fn objects_without_address_are_skipped() {
        assert!(record_from_object("ga.chan", &object(json!({}))).is_none());
        assert!(record_from_object("ga.bad", &object(json!({ "address": "99/9/999" }))).is_none());
        assert!(record_from_object("ga.neg", &object(json!({ "address": -1 }))).is_none());
    }

    #[tokio::test]
    async fn rebuild_replaces_everything() {
        let repo = MemoryRepository::new();
        repo.set_object_not_exists("ga.a.1_0_1", object(json!({ "address": "1/0/1" })))
            .await
            .unwrap();
        repo.set_object_not_exists("ga.a", object(json!({}))).await.unwrap();
        repo.set_object_not_exists("other.1_0_2", object(json!({ "address": "1/0/2" })))
            .await
            .unwrap();

        let store = MappingStore::new();
        store.replace([MappingRecord {
            id: "ga.stale".into(),
            address: GroupAddress::new(1),
            type_code: None,
            flags: AccessFlags::default(),
        }]);

        let mut rx = store.subscribe();
        assert_eq!(store.rebuild(&repo).await.unwrap(), 1);
        assert!(rx.has_changed().unwrap());
        assert!(store.get("ga.stale").is_none());
        assert_eq!(store.get("ga.a.1_0_1").unwrap().address.raw(), 0x0801);
        assert_eq!(store.len(), 1);
    }
}
