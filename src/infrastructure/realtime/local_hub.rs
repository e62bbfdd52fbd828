use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::application::ports::room_hub::{ControlMessage, OutboundMessage, RoomCommand, RoomHandle, RoomHub};
use crate::application::ports::update_store::UpdateStore;
use crate::application::services::hydrator::Hydrator;
use crate::infrastructure::realtime::room_actor::{RoomActor, SnapshotPolicy};

/// Single-process [`RoomHub`]: one actor task per live room, registered in
/// a process-wide map. Cross-process fan-out is out of this type's scope
/// (see [`RedisBackplane`](super::redis_backplane::RedisBackplane)); a
/// deployment with one worker process can use this alone.
#[derive(Clone)]
pub struct LocalRoomHub {
    rooms: Arc<Mutex<HashMap<String, mpsc::Sender<RoomCommand>>>>,
    store: Arc<dyn UpdateStore>,
    policy: SnapshotPolicy,
    post_snapshot_hook: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl LocalRoomHub {
    pub fn new(store: Arc<dyn UpdateStore>, policy: SnapshotPolicy) -> Self {
        Self { rooms: Arc::new(Mutex::new(HashMap::new())), store, policy, post_snapshot_hook: None }
    }

    /// Installs an optional hook invoked with the room id after every
    /// successful snapshot upsert (opportunistic or teardown). Left
    /// unwired by default; callers decide policy.
    pub fn with_post_snapshot_hook(mut self, hook: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        self.post_snapshot_hook = Some(hook);
        self
    }

    fn get_or_spawn(&self, room_id: &str) -> mpsc::Sender<RoomCommand> {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(tx) = rooms.get(room_id) {
            return tx.clone();
        }
        let hydrator = Arc::new(Hydrator::new(self.store.clone()));
        let rooms_for_cleanup = self.rooms.clone();
        let room_id_owned = room_id.to_string();
        let on_empty: Arc<dyn Fn(&str) + Send + Sync> = Arc::new(move |room_id: &str| {
            rooms_for_cleanup.lock().unwrap().remove(room_id);
        });
        let _ = &room_id_owned;
        let (tx, _handle) = RoomActor::spawn(
            room_id.to_string(),
            hydrator,
            self.store.clone(),
            self.policy,
            self.post_snapshot_hook.clone(),
            on_empty,
        );
        rooms.insert(room_id.to_string(), tx.clone());
        tx
    }
}

#[async_trait]
impl RoomHub for LocalRoomHub {
    async fn join(
        &self,
        room_id: &str,
        session_id: Uuid,
        outbox: mpsc::Sender<OutboundMessage>,
    ) -> anyhow::Result<(RoomHandle, Vec<u8>)> {
        let cmd_tx = self.get_or_spawn(room_id);
        let (reply, rx) = oneshot::channel();
        cmd_tx
            .send(RoomCommand::Join { session_id, outbox, reply })
            .await
            .map_err(|_| anyhow::anyhow!("room actor gone"))?;
        let state_vector = rx.await.map_err(|_| anyhow::anyhow!("room actor dropped reply"))?;
        Ok((RoomHandle { room_id: room_id.to_string(), session_id, cmd_tx }, state_vector))
    }

    async fn send_control(&self, room_id: &str, message: ControlMessage) -> anyhow::Result<()> {
        let cmd_tx = {
            let rooms = self.rooms.lock().unwrap();
            rooms.get(room_id).cloned()
        };
        if let Some(cmd_tx) = cmd_tx {
            let _ = cmd_tx.send(RoomCommand::SendControl { message }).await;
        }
        Ok(())
    }
}
