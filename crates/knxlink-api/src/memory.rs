// ── In-memory state repository ──
//
// Lock-free `DashMap` storage with prefix-filtered push notification.
// Serializable to a JSON snapshot so the CLI can keep objects between
// invocations.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::store::{ObjectPatch, State, StateChange, StateRepository, StoredObject};

/// Serializable image of a [`MemoryRepository`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    #[serde(default)]
    pub objects: BTreeMap<String, StoredObject>,
    #[serde(default)]
    pub states: BTreeMap<String, State>,
}

/// Reference [`StateRepository`] kept entirely in memory.
#[derive(Default)]
pub struct MemoryRepository {
    objects: DashMap<String, StoredObject>,
    states: DashMap<String, State>,
    subscribers: DashMap<u64, (String, mpsc::UnboundedSender<StateChange>)>,
    next_subscriber: AtomicU64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        let repo = Self::new();
        for (id, object) in snapshot.objects {
            repo.objects.insert(id, object);
        }
        for (id, state) in snapshot.states {
            repo.states.insert(id, state);
        }
        repo
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            objects: self
                .objects
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect(),
            states: self
                .states
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect(),
        }
    }

    /// Load a snapshot file, or start empty when it does not exist yet.
    pub fn load_json(path: &Path) -> Result<Self, Error> {
        match std::fs::read(path) {
            Ok(bytes) => {
                let snapshot: RepositorySnapshot = serde_json::from_slice(&bytes)?;
                Ok(Self::from_snapshot(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn notify(&self, change: &StateChange) {
        // Closed receivers are pruned on the way.
        self.subscribers.retain(|_, (prefix, tx)| {
            !change.id.starts_with(prefix.as_str()) || tx.send(change.clone()).is_ok()
        });
    }
}

#[async_trait]
impl StateRepository for MemoryRepository {
    async fn get_object(&self, id: &str) -> Result<Option<StoredObject>, Error> {
        Ok(self.objects.get(id).map(|r| r.value().clone()))
    }

    async fn set_object_not_exists(&self, id: &str, object: StoredObject) -> Result<bool, Error> {
        match self.objects.entry(id.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(object);
                Ok(true)
            }
        }
    }

    async fn extend_object(&self, id: &str, patch: ObjectPatch) -> Result<(), Error> {
        let mut object = self
            .objects
            .get_mut(id)
            .ok_or_else(|| Error::ObjectNotFound { id: id.into() })?;
        patch.apply(object.value_mut());
        Ok(())
    }

    async fn objects_with_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredObject)>, Error> {
        let mut found: Vec<(String, StoredObject)> = self
            .objects
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    async fn get_state(&self, id: &str) -> Result<Option<State>, Error> {
        Ok(self.states.get(id).map(|r| r.value().clone()))
    }

    async fn set_state(&self, id: &str, state: State) -> Result<(), Error> {
        self.states.insert(id.to_owned(), state.clone());
        self.notify(&StateChange {
            id: id.to_owned(),
            state,
        });
        Ok(())
    }

    fn subscribe_states(&self, prefix: &str) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(key, (prefix.to_owned(), tx));
        rx
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{ObjectCommon, ObjectKind};

    fn state_object(name: &str) -> StoredObject {
        StoredObject {
            kind: ObjectKind::State,
            common: ObjectCommon {
                name: name.into(),
                ..ObjectCommon::default()
            },
            native: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn set_object_not_exists_keeps_first_object() {
        let repo = MemoryRepository::new();
        assert!(repo.set_object_not_exists("ga.a", state_object("first")).await.unwrap());
        assert!(!repo.set_object_not_exists("ga.a", state_object("second")).await.unwrap());
        let obj = repo.get_object("ga.a").await.unwrap().unwrap();
        assert_eq!(obj.common.name, "first");
    }

    #[tokio::test]
    async fn extend_merges_native_keys() {
        let repo = MemoryRepository::new();
        let mut obj = state_object("x");
        obj.native.insert("keep".into(), json!(1));
        repo.set_object_not_exists("ga.x", obj).await.unwrap();

        let mut native = serde_json::Map::new();
        native.insert("address".into(), json!("1/2/3"));
        repo.extend_object("ga.x", ObjectPatch { common: None, native })
            .await
            .unwrap();

        let obj = repo.get_object("ga.x").await.unwrap().unwrap();
        assert_eq!(obj.native["keep"], json!(1));
        assert_eq!(obj.native["address"], json!("1/2/3"));
    }

    #[tokio::test]
    async fn extend_missing_object_fails() {
        let repo = MemoryRepository::new();
        let result = repo.extend_object("ga.none", ObjectPatch::default()).await;
        assert!(matches!(result, Err(Error::ObjectNotFound { .. })));
    }

    #[tokio::test]
    async fn prefix_query_is_sorted_and_filtered() {
        let repo = MemoryRepository::new();
        for id in ["ga.b", "info.hash", "ga.a"] {
            repo.set_object_not_exists(id, state_object(id)).await.unwrap();
        }
        let ids: Vec<String> = repo
            .objects_with_prefix("ga.")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["ga.a".to_string(), "ga.b".to_string()]);
    }

    #[tokio::test]
    async fn subscribers_only_see_their_prefix() {
        let repo = MemoryRepository::new();
        let mut rx = repo.subscribe_states("ga.");

        repo.set_state("info.connection", State::acknowledged(json!(true)))
            .await
            .unwrap();
        repo.set_state("ga.light", State::command(json!(1))).await.unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.id, "ga.light");
        assert!(!change.state.ack);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.json");

        let repo = MemoryRepository::new();
        repo.set_object_not_exists("ga.a", state_object("a")).await.unwrap();
        repo.set_state("ga.a", State::acknowledged(json!(21.5))).await.unwrap();
        repo.save_json(&path).unwrap();

        let loaded = MemoryRepository::load_json(&path).unwrap();
        assert_eq!(loaded.snapshot(), repo.snapshot());
    }
}
