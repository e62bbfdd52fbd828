use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, ReadTxn, StateVector, Transact, Update};

use crate::application::ports::room_hub::{ControlMessage, OutboundMessage, RoomCommand};
use crate::application::ports::update_store::UpdateStore;
use crate::application::services::hydrator::Hydrator;

/// Knobs for the actor's opportunistic snapshot policy: minimum
/// interval between snapshots and the edit count that forces one
/// regardless of interval.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPolicy {
    pub min_interval: Duration,
    pub after_edit_count: u32,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self { min_interval: Duration::from_secs(15), after_edit_count: 50 }
    }
}

/// Sole writer for one room's CRDT replica. Sessions never touch the
/// `Doc` directly; every mutation is funneled through this task's command
/// queue so apply + append + broadcast stay atomic with respect to other
/// writers on the room.
pub struct RoomActor {
    room_id: String,
    doc: Doc,
    store: Arc<dyn UpdateStore>,
    sessions: HashMap<Uuid, mpsc::Sender<OutboundMessage>>,
    last_update_id: i64,
    edits_since_snapshot: u32,
    last_snapshot_at: std::time::Instant,
    policy: SnapshotPolicy,
    post_snapshot_hook: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    on_empty: Arc<dyn Fn(&str) + Send + Sync>,
}

impl RoomActor {
    /// Hydrates the room and spawns its actor task, returning the command
    /// channel [`LocalRoomHub`](super::local_hub::LocalRoomHub) hands out
    /// to joining sessions. `on_empty` is invoked once, after the last
    /// session leaves and any final snapshot is attempted, so the hub can
    /// remove the room from its registry.
    pub fn spawn(
        room_id: String,
        hydrator: Arc<Hydrator>,
        store: Arc<dyn UpdateStore>,
        policy: SnapshotPolicy,
        post_snapshot_hook: Option<Arc<dyn Fn(&str) + Send + Sync>>,
        on_empty: Arc<dyn Fn(&str) + Send + Sync>,
    ) -> (mpsc::Sender<RoomCommand>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(256);
        let handle = tokio::spawn(async move {
            let hydrated = match hydrator.hydrate(&room_id).await {
                Ok(h) => h,
                Err(e) => {
                    tracing::error!(room_id = %room_id, error = ?e, "room_hydration_failed");
                    (on_empty)(&room_id);
                    return;
                }
            };
            let actor = RoomActor {
                room_id: room_id.clone(),
                doc: hydrated.doc,
                store,
                sessions: HashMap::new(),
                last_update_id: hydrated.last_update_id,
                edits_since_snapshot: 0,
                last_snapshot_at: std::time::Instant::now(),
                policy,
                post_snapshot_hook,
                on_empty,
            };
            actor.run(rx).await;
        });
        (tx, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                RoomCommand::Join { session_id, outbox, reply } => {
                    self.sessions.insert(session_id, outbox);
                    let sv = self.doc.transact().state_vector().encode_v1();
                    let _ = reply.send(sv);
                }
                RoomCommand::SyncStep1 { state_vector, reply, .. } => {
                    let result = self.handle_sync_step1(&state_vector);
                    let _ = reply.send(result);
                }
                RoomCommand::ApplyUpdate { session_id, update, meta, reply } => {
                    let result = self.handle_apply_update(session_id, update, meta).await;
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { session_id } => {
                    self.sessions.remove(&session_id);
                    if self.sessions.is_empty() {
                        self.snapshot_on_teardown().await;
                        (self.on_empty)(&self.room_id);
                        return;
                    }
                }
                RoomCommand::SendControl { message } => {
                    self.broadcast(OutboundMessage::Control(message), None).await;
                }
                RoomCommand::Snapshot => {
                    self.maybe_opportunistic_snapshot().await;
                }
            }
        }
        // Channel closed with no explicit Leave (every sender dropped):
        // treat as empty and attempt the same teardown snapshot.
        if !self.sessions.is_empty() {
            self.sessions.clear();
        }
        self.snapshot_on_teardown().await;
        (self.on_empty)(&self.room_id);
    }

    fn handle_sync_step1(&self, state_vector: &[u8]) -> anyhow::Result<Vec<u8>> {
        let sv = StateVector::decode_v1(state_vector)?;
        Ok(self.doc.transact().encode_state_as_update_v1(&sv))
    }

    /// Persists before mutating the in-memory replica: if `append` fails,
    /// `self.doc` must never have moved past what the durable log holds,
    /// or the next peer's sync-step-1 diff would include an edit no
    /// snapshot or replay could ever reconstruct after this process exits.
    async fn handle_apply_update(&mut self, from: Uuid, update: Vec<u8>, meta: Vec<u8>) -> anyhow::Result<i64> {
        let decoded = Update::decode_v1(&update)?;
        let id = self.store.append(&self.room_id, &update, &meta).await?;
        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(decoded)?;
        }
        self.last_update_id = self.last_update_id.max(id);
        self.edits_since_snapshot += 1;

        self.broadcast(OutboundMessage::Binary(update), Some(from)).await;

        if self.edits_since_snapshot >= self.policy.after_edit_count {
            self.maybe_opportunistic_snapshot().await;
        }

        Ok(id)
    }

    async fn broadcast(&mut self, message: OutboundMessage, except: Option<Uuid>) {
        let mut dead = Vec::new();
        for (session_id, outbox) in self.sessions.iter() {
            if Some(*session_id) == except {
                continue;
            }
            if outbox.send(message.clone()).await.is_err() {
                dead.push(*session_id);
            }
        }
        for id in dead {
            self.sessions.remove(&id);
        }
    }

    fn encode_snapshot(&self) -> Vec<u8> {
        self.doc.transact().encode_state_as_update_v1(&StateVector::default())
    }

    async fn maybe_opportunistic_snapshot(&mut self) {
        if self.edits_since_snapshot == 0 {
            return;
        }
        if self.last_snapshot_at.elapsed() < self.policy.min_interval
            && self.edits_since_snapshot < self.policy.after_edit_count
        {
            return;
        }
        let bytes = self.encode_snapshot();
        if !crate::application::ports::update_store::is_snapshot_valid(&bytes) {
            return;
        }
        if let Err(e) = self.store.upsert_snapshot(&self.room_id, &bytes, self.last_update_id).await {
            tracing::error!(room_id = %self.room_id, error = ?e, "opportunistic_snapshot_failed");
            return;
        }
        self.edits_since_snapshot = 0;
        self.last_snapshot_at = std::time::Instant::now();
        if let Some(hook) = &self.post_snapshot_hook {
            hook(&self.room_id);
        }
    }

    /// Disconnect-path snapshot: only runs when this is the last session
    /// leaving the room, and only persists when the encoded document is
    /// non-trivial (empty documents must never be snapshotted).
    async fn snapshot_on_teardown(&mut self) {
        let bytes = self.encode_snapshot();
        if !crate::application::ports::update_store::is_snapshot_valid(&bytes) {
            return;
        }
        let last_update_id = match self.store.get_max_id(&self.room_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(room_id = %self.room_id, error = ?e, "teardown_get_max_id_failed");
                return;
            }
        };
        if let Err(e) = self.store.upsert_snapshot(&self.room_id, &bytes, last_update_id).await {
            tracing::error!(room_id = %self.room_id, error = ?e, "teardown_snapshot_failed");
            return;
        }
        if let Some(hook) = &self.post_snapshot_hook {
            hook(&self.room_id);
        }
        if let Err(e) = self.store.prune_before(&self.room_id, last_update_id).await {
            tracing::warn!(room_id = %self.room_id, error = ?e, "teardown_prune_failed");
        }
    }
}
