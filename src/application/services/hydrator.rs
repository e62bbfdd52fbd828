use std::sync::Arc;

use futures_util::StreamExt;
use yrs::updates::decoder::Decode;
use yrs::{Doc, Transact, Update};

use crate::application::ports::update_store::{UpdateStore, is_snapshot_valid};

/// Builds a fresh CRDT document reflecting a room's durable state:
/// snapshot + updates-since (fast path) when a valid snapshot exists,
/// full replay from id 0 otherwise.
pub struct Hydrator {
    store: Arc<dyn UpdateStore>,
}

pub struct HydratedRoom {
    pub doc: Doc,
    /// Highest update id folded into `doc`, used as the base for the
    /// room actor's append counter and for the next snapshot's
    /// `last_update_id`.
    pub last_update_id: i64,
    pub used_snapshot: bool,
}

impl Hydrator {
    pub fn new(store: Arc<dyn UpdateStore>) -> Self {
        Self { store }
    }

    pub async fn hydrate(&self, room_id: &str) -> anyhow::Result<HydratedRoom> {
        let doc = Doc::new();
        let snapshot = self.store.get_snapshot(room_id).await?;

        if let Some(snapshot) = snapshot.filter(|s| is_snapshot_valid(&s.snapshot)) {
            apply_bytes(&doc, &snapshot.snapshot)?;
            let mut stream = self.store.read_since(room_id, snapshot.last_update_id).await?;
            let mut last_update_id = snapshot.last_update_id;
            while let Some(record) = stream.next().await {
                let record = record?;
                apply_bytes(&doc, &record.update)?;
                last_update_id = last_update_id.max(record.id);
            }
            Ok(HydratedRoom { doc, last_update_id, used_snapshot: true })
        } else {
            let mut stream = self.store.read_all(room_id).await?;
            let mut count = 0i64;
            while let Some(record) = stream.next().await {
                let record = record?;
                apply_bytes(&doc, &record.update)?;
                count += 1;
            }
            // read_all doesn't carry ids; the actual max id (which may
            // exceed the replay count if earlier ids were pruned) is
            // authoritative and fetched separately by the caller.
            let _ = count;
            let last_update_id = self.store.get_max_id(room_id).await?;
            Ok(HydratedRoom { doc, last_update_id, used_snapshot: false })
        }
    }
}

fn apply_bytes(doc: &Doc, bytes: &[u8]) -> anyhow::Result<()> {
    let update = Update::decode_v1(bytes)?;
    let mut txn = doc.transact_mut();
    txn.apply_update(update)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::update_store::{SnapshotRecord, UpdateRecord, UpdateRecordWithId};
    use async_trait::async_trait;
    use chrono::Utc;
    use futures_core::stream::BoxStream;
    use std::sync::Mutex;
    use yrs::{GetString, ReadTxn, StateVector, Text, Transact};

    #[derive(Default)]
    struct FakeStore {
        snapshot: Mutex<Option<SnapshotRecord>>,
        updates: Mutex<Vec<(i64, Vec<u8>)>>,
        read_all_called: Mutex<bool>,
        read_since_called: Mutex<Option<i64>>,
    }

    #[async_trait]
    impl UpdateStore for FakeStore {
        async fn append(&self, _room_id: &str, _update: &[u8], _meta: &[u8]) -> anyhow::Result<i64> {
            unimplemented!()
        }

        async fn read_all(&self, _room_id: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<UpdateRecord>>> {
            *self.read_all_called.lock().unwrap() = true;
            let items: Vec<anyhow::Result<UpdateRecord>> = self
                .updates
                .lock()
                .unwrap()
                .iter()
                .map(|(_, u)| Ok(UpdateRecord { update: u.clone(), meta: vec![], timestamp: Utc::now() }))
                .collect();
            Ok(Box::pin(futures_util::stream::iter(items)))
        }

        async fn read_since(
            &self,
            _room_id: &str,
            last_inclusive_id: i64,
        ) -> anyhow::Result<BoxStream<'static, anyhow::Result<UpdateRecordWithId>>> {
            *self.read_since_called.lock().unwrap() = Some(last_inclusive_id);
            let items: Vec<anyhow::Result<UpdateRecordWithId>> = self
                .updates
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| *id > last_inclusive_id)
                .map(|(id, u)| Ok(UpdateRecordWithId { id: *id, update: u.clone(), meta: vec![], timestamp: Utc::now() }))
                .collect();
            Ok(Box::pin(futures_util::stream::iter(items)))
        }

        async fn get_max_id(&self, _room_id: &str) -> anyhow::Result<i64> {
            Ok(self.updates.lock().unwrap().iter().map(|(id, _)| *id).max().unwrap_or(0))
        }

        async fn get_snapshot(&self, _room_id: &str) -> anyhow::Result<Option<SnapshotRecord>> {
            Ok(self.snapshot.lock().unwrap().clone())
        }

        async fn upsert_snapshot(&self, _room_id: &str, _snapshot: &[u8], _last_update_id: i64) -> anyhow::Result<()> {
            unimplemented!()
        }

        async fn prune_before(&self, _room_id: &str, _last_update_id: i64) -> anyhow::Result<u64> {
            unimplemented!()
        }
    }

    fn update_for(content: &str) -> Vec<u8> {
        let doc = Doc::new();
        let text = doc.get_or_insert_text("content");
        let mut txn = doc.transact_mut();
        text.push(&mut txn, content);
        drop(txn);
        doc.transact().encode_state_as_update_v1(&StateVector::default())
    }

    #[tokio::test]
    async fn uses_snapshot_path_when_valid() {
        let store = Arc::new(FakeStore {
            snapshot: Mutex::new(Some(SnapshotRecord { snapshot: update_for("hello"), last_update_id: 100 })),
            updates: Mutex::new(vec![(101, update_for(" world"))]),
            ..Default::default()
        });
        let hydrator = Hydrator::new(store.clone());
        let hydrated = hydrator.hydrate("page_x").await.unwrap();

        assert!(hydrated.used_snapshot);
        assert!(*store.read_since_called.lock().unwrap() == Some(100));
        assert!(!*store.read_all_called.lock().unwrap());
    }

    #[tokio::test]
    async fn falls_back_to_full_replay_on_corrupt_snapshot() {
        let store = Arc::new(FakeStore {
            snapshot: Mutex::new(Some(SnapshotRecord { snapshot: vec![0u8, 0u8], last_update_id: 50 })),
            updates: Mutex::new(vec![(1, update_for("a")), (2, update_for("b"))]),
            ..Default::default()
        });
        let hydrator = Hydrator::new(store.clone());
        let hydrated = hydrator.hydrate("page_x").await.unwrap();

        assert!(!hydrated.used_snapshot);
        assert!(*store.read_all_called.lock().unwrap());
        assert!(store.read_since_called.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn no_snapshot_no_updates_is_empty_document() {
        let store = Arc::new(FakeStore::default());
        let hydrator = Hydrator::new(store);
        let hydrated = hydrator.hydrate("page_x").await.unwrap();
        let text = hydrated.doc.get_or_insert_text("content");
        let txn = hydrated.doc.transact();
        assert_eq!(text.get_string(&txn), "");
    }
}
