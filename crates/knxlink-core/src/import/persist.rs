// ── Writing import results into the state store ──
//
// Each entry is created if absent, otherwise its metadata is extended.
// Entries are independent: one failure is counted and logged, the rest
// still go through.

use std::collections::HashSet;

use knxlink_api::{ObjectCommon, ObjectKind, ObjectPatch, State, StateRepository, StoredObject};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::entry::channel_ids;
use crate::model::{AddressStyle, ImportEntry, TypeCode, ValueKind};

/// State holding the content hash of the last imported project.
pub const PROJECT_HASH_ID: &str = "info.projectHash";

/// Native keys of a persisted entry object.
pub(crate) mod keys {
    pub const ADDRESS: &str = "address";
    pub const ADDRESS_STYLE: &str = "addressStyle";
    pub const TYPE: &str = "dpt";
    pub const FLAGS: &str = "flags";
}

/// Counters returned by [`persist_entries`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Store role and value type for an entry.
pub fn infer_role(type_code: Option<&TypeCode>, writable: bool) -> (&'static str, &'static str) {
    let kind = type_code.map_or(ValueKind::Number, TypeCode::value_kind);
    let role = match kind {
        ValueKind::Boolean if writable => "switch",
        ValueKind::Boolean => "indicator",
        ValueKind::Text => "text",
        ValueKind::Date => "date",
        ValueKind::Number => "value",
    };
    (role, kind.store_type())
}

/// Store object for one entry.
pub fn entry_object(entry: &ImportEntry, style: AddressStyle) -> StoredObject {
    let (role, value_type) = infer_role(entry.type_code.as_ref(), entry.flags.write);

    let mut native = Map::new();
    native.insert(keys::ADDRESS.into(), Value::String(entry.address.clone()));
    native.insert(keys::ADDRESS_STYLE.into(), Value::String(style.as_str().into()));
    // Always present so an extend clears a type the project no longer has.
    let type_code = entry
        .type_code
        .as_ref()
        .map_or(Value::Null, |t| Value::String(t.as_str().into()));
    native.insert(keys::TYPE.into(), type_code);
    native.insert(
        keys::FLAGS.into(),
        json!({
            "read": entry.flags.read,
            "write": entry.flags.write,
            "transmit": entry.flags.transmit,
            "update": entry.flags.update,
        }),
    );

    StoredObject {
        kind: ObjectKind::State,
        common: ObjectCommon {
            name: entry.name.clone(),
            desc: entry.description.clone(),
            role: Some(role.into()),
            value_type: Some(value_type.into()),
            read: entry.flags.read || entry.flags.transmit || entry.flags.update,
            write: entry.flags.write,
        },
        native,
    }
}

/// Create or extend the store objects for `entries`.
pub async fn persist_entries(
    repo: &dyn StateRepository,
    entries: &[ImportEntry],
    style: AddressStyle,
) -> PersistReport {
    let mut report = PersistReport::default();
    let mut channels = HashSet::new();

    for entry in entries {
        for (id, name) in channel_ids(&entry.path).into_iter().zip(&entry.path) {
            if channels.insert(id.clone()) {
                ensure_channel(repo, &id, name).await;
            }
        }

        let object = entry_object(entry, style);
        match write_entry(repo, &entry.id, object).await {
            Ok(true) => report.created += 1,
            Ok(false) => report.updated += 1,
            Err(e) => {
                warn!(error = %e, "entry not persisted");
                report.failed += 1;
            }
        }
    }

    debug!(
        created = report.created,
        updated = report.updated,
        failed = report.failed,
        "entries persisted"
    );
    report
}

/// Persist `entries` and remember `hash` as imported. The hash is only
/// recorded when every entry went through, so a partial import is retried
/// on the next run.
pub async fn persist_import(
    repo: &dyn StateRepository,
    entries: &[ImportEntry],
    style: AddressStyle,
    hash: &str,
) -> Result<PersistReport, CoreError> {
    let report = persist_entries(repo, entries, style).await;
    if report.failed == 0 {
        record_hash(repo, hash).await?;
    } else {
        warn!(failed = report.failed, "project hash not recorded");
    }
    Ok(report)
}

/// Returns `true` when the object was newly created.
async fn write_entry(
    repo: &dyn StateRepository,
    id: &str,
    object: StoredObject,
) -> Result<bool, CoreError> {
    let fail = |e: knxlink_api::Error| CoreError::StoreWriteFailure {
        id: id.into(),
        reason: e.to_string(),
    };

    if repo.set_object_not_exists(id, object.clone()).await.map_err(fail)? {
        return Ok(true);
    }
    let patch = ObjectPatch {
        common: Some(object.common),
        native: object.native,
    };
    repo.extend_object(id, patch).await.map_err(fail)?;
    Ok(false)
}

async fn ensure_channel(repo: &dyn StateRepository, id: &str, name: &str) {
    let channel = StoredObject {
        kind: ObjectKind::Channel,
        common: ObjectCommon {
            name: name.trim().to_owned(),
            ..ObjectCommon::default()
        },
        native: Map::new(),
    };
    if let Err(e) = repo.set_object_not_exists(id, channel).await {
        warn!(id, error = %e, "channel not created");
    }
}

// ── Project hash ─────────────────────────────────────────────────────

/// Whether the store already holds an import of content `hash`.
pub async fn is_up_to_date(repo: &dyn StateRepository, hash: &str) -> Result<bool, CoreError> {
    let state = repo.get_state(PROJECT_HASH_ID).await?;
    Ok(state.is_some_and(|s| s.val.as_str() == Some(hash)))
}

/// Remember `hash` as the last imported project content.
pub async fn record_hash(repo: &dyn StateRepository, hash: &str) -> Result<(), CoreError> {
    let object = StoredObject {
        kind: ObjectKind::State,
        common: ObjectCommon {
            name: "Project file hash".into(),
            role: Some("text".into()),
            value_type: Some("string".into()),
            read: true,
            write: false,
            ..ObjectCommon::default()
        },
        native: Map::new(),
    };
    repo.set_object_not_exists(PROJECT_HASH_ID, object).await?;
    repo.set_state(PROJECT_HASH_ID, State::acknowledged(Value::String(hash.into())))
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use knxlink_api::{MemoryRepository, StateChange};
    use tokio::sync::mpsc;

    use super::*;
    use crate::model::AccessFlags;

    fn entry(path: &[&str], address: &str, dpt: Option<&str>, flags: AccessFlags) -> ImportEntry {
        let path: Vec<String> = path.iter().map(|s| (*s).to_owned()).collect();
        ImportEntry {
            id: crate::model::entry_id(&path, address),
            name: format!("GA {address}"),
            description: None,
            path,
            address: address.into(),
            type_code: dpt.and_then(TypeCode::normalize),
            flags,
        }
    }

    #[test]
    fn role_inference_by_major_type() {
        let code = TypeCode::normalize;
        assert_eq!(infer_role(code("1.001").as_ref(), true), ("switch", "boolean"));
        assert_eq!(infer_role(code("1.001").as_ref(), false), ("indicator", "boolean"));
        assert_eq!(infer_role(code("16.000").as_ref(), true), ("text", "string"));
        assert_eq!(infer_role(code("19.001").as_ref(), false), ("date", "string"));
        assert_eq!(infer_role(code("9.001").as_ref(), false), ("value", "number"));
        assert_eq!(infer_role(None, true), ("value", "number"));
    }

    #[tokio::test]
    async fn creates_then_extends() {
        let repo = MemoryRepository::new();
        let rw = AccessFlags::new(true, true, false, false);
        let entries = vec![
            entry(&["Living Room", "Lights"], "1/0/1", Some("DPST-1-1"), rw),
            entry(&["Living Room"], "1/0/2", None, AccessFlags::unreferenced()),
        ];

        let first = persist_entries(&repo, &entries, AddressStyle::ThreeLevel).await;
        assert_eq!(first, PersistReport { created: 2, updated: 0, failed: 0 });

        let channel = repo.get_object("ga.Living_Room.Lights").await.unwrap().unwrap();
        assert_eq!(channel.kind, ObjectKind::Channel);
        assert_eq!(channel.common.name, "Lights");

        let state = repo.get_object("ga.Living_Room.Lights.1_0_1").await.unwrap().unwrap();
        assert_eq!(state.common.role.as_deref(), Some("switch"));
        assert_eq!(state.native["address"], "1/0/1");
        assert_eq!(state.native["addressStyle"], "ThreeLevel");
        assert_eq!(state.native["dpt"], "1.001");
        assert_eq!(state.native["flags"]["write"], true);

        let second = persist_entries(&repo, &entries, AddressStyle::ThreeLevel).await;
        assert_eq!(second, PersistReport { created: 0, updated: 2, failed: 0 });
    }

    #[tokio::test]
    async fn extend_clears_a_dropped_type() {
        let repo = MemoryRepository::new();
        let rw = AccessFlags::new(true, true, false, false);
        let typed = vec![entry(&["Hall"], "1/0/1", Some("DPST-1-1"), rw)];
        let untyped = vec![entry(&["Hall"], "1/0/1", None, rw)];

        persist_entries(&repo, &typed, AddressStyle::ThreeLevel).await;
        let report = persist_entries(&repo, &untyped, AddressStyle::ThreeLevel).await;
        assert_eq!(report.updated, 1);

        let state = repo.get_object("ga.Hall.1_0_1").await.unwrap().unwrap();
        assert_eq!(state.native["dpt"], Value::Null);
        assert_eq!(state.common.role.as_deref(), Some("value"));
    }

    /// Repository refusing writes to one id.
    struct Refusing {
        inner: MemoryRepository,
        refuse: &'static str,
    }

    #[async_trait]
    impl StateRepository for Refusing {
        async fn get_object(&self, id: &str) -> Result<Option<StoredObject>, knxlink_api::Error> {
            self.inner.get_object(id).await
        }
        async fn set_object_not_exists(
            &self,
            id: &str,
            object: StoredObject,
        ) -> Result<bool, knxlink_api::Error> {
            if id == self.refuse {
                return Err(knxlink_api::Error::Store {
                    message: "read-only".into(),
                });
            }
            self.inner.set_object_not_exists(id, object).await
        }
        async fn extend_object(&self, id: &str, patch: ObjectPatch) -> Result<(), knxlink_api::Error> {
            self.inner.extend_object(id, patch).await
        }
        async fn objects_with_prefix(
            &self,
            prefix: &str,
        ) -> Result<Vec<(String, StoredObject)>, knxlink_api::Error> {
            self.inner.objects_with_prefix(prefix).await
        }
        async fn get_state(&self, id: &str) -> Result<Option<State>, knxlink_api::Error> {
            self.inner.get_state(id).await
        }
        async fn set_state(&self, id: &str, state: State) -> Result<(), knxlink_api::Error> {
            self.inner.set_state(id, state).await
        }
        fn subscribe_states(&self, prefix: &str) -> mpsc::UnboundedReceiver<StateChange> {
            self.inner.subscribe_states(prefix)
        }
    }

    #[tokio::test]
    async fn one_failing_entry_does_not_block_others() {
        let repo = Refusing {
            inner: MemoryRepository::new(),
            refuse: "ga.A.1_0_1",
        };
        let flags = AccessFlags::unreferenced();
        let entries = vec![
            entry(&["A"], "1/0/1", None, flags),
            entry(&["A"], "1/0/2", None, flags),
        ];

        let report = persist_entries(&repo, &entries, AddressStyle::ThreeLevel).await;
        assert_eq!(report, PersistReport { created: 1, updated: 0, failed: 1 });
        assert!(repo.get_object("ga.A.1_0_2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn partial_import_leaves_the_hash_unrecorded() {
        let repo = Refusing {
            inner: MemoryRepository::new(),
            refuse: "ga.A.1_0_1",
        };
        let flags = AccessFlags::unreferenced();
        let entries = vec![
            entry(&["A"], "1/0/1", None, flags),
            entry(&["A"], "1/0/2", None, flags),
        ];

        let report = persist_import(&repo, &entries, AddressStyle::ThreeLevel, "abc")
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert!(!is_up_to_date(&repo, "abc").await.unwrap());

        let clean = MemoryRepository::new();
        let report = persist_import(&clean, &entries, AddressStyle::ThreeLevel, "abc")
            .await
            .unwrap();
        assert_eq!(report.created, 2);
        assert!(is_up_to_date(&clean, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn hash_round_trip() {
        let repo = MemoryRepository::new();
        assert!(!is_up_to_date(&repo, "abc").await.unwrap());

        record_hash(&repo, "abc").await.unwrap();
        assert!(is_up_to_date(&repo, "abc").await.unwrap());
        assert!(!is_up_to_date(&repo, "def").await.unwrap());
    }
}
