use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Typed control message the Hub fans out to every session in a room.
/// Each Session filters by target user id when the message is
/// user-targeted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ControlMessage {
    AccessRevoked { user_id: Uuid },
    WritePermissionRevoked { user_id: Uuid },
    LinksUpdated { page_external_id: String },
}

/// A message pushed out of the room actor toward one connected session.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// A raw CRDT protocol frame (sync step 2 / update), sent as-is.
    Binary(Vec<u8>),
    Control(ControlMessage),
}

/// Handle a session uses to talk to its room's actor after joining.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: String,
    pub session_id: Uuid,
    pub(crate) cmd_tx: mpsc::Sender<RoomCommand>,
}

/// Commands accepted by a room actor. Internal to the realtime
/// infrastructure; exposed here only so [`RoomHandle`] callers
/// (Session) can construct them.
pub enum RoomCommand {
    /// Registers a session's outbox and returns the document's current
    /// state vector. Issued once by [`RoomHub::join`], never by a
    /// [`RoomHandle`] method — a session has no handle until this
    /// completes.
    Join {
        session_id: Uuid,
        outbox: mpsc::Sender<OutboundMessage>,
        reply: tokio::sync::oneshot::Sender<Vec<u8>>,
    },
    /// Compute the diff the peer (identified by the state vector it
    /// sent) is missing. Always allowed regardless of write access.
    SyncStep1 {
        session_id: Uuid,
        state_vector: Vec<u8>,
        reply: tokio::sync::oneshot::Sender<anyhow::Result<Vec<u8>>>,
    },
    /// Apply + append + broadcast an editor-admitted mutation.
    ApplyUpdate {
        session_id: Uuid,
        update: Vec<u8>,
        meta: Vec<u8>,
        reply: tokio::sync::oneshot::Sender<anyhow::Result<i64>>,
    },
    Leave {
        session_id: Uuid,
    },
    SendControl {
        message: ControlMessage,
    },
    /// Force an opportunistic snapshot+prune outside the disconnect path.
    Snapshot,
}

impl RoomHandle {
    pub async fn sync_step1(&self, state_vector: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::SyncStep1 {
                session_id: self.session_id,
                state_vector,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("room actor gone"))?;
        rx.await.map_err(|_| anyhow::anyhow!("room actor dropped reply"))?
    }

    pub async fn apply_update(&self, update: Vec<u8>, meta: Vec<u8>) -> anyhow::Result<i64> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.cmd_tx
            .send(RoomCommand::ApplyUpdate {
                session_id: self.session_id,
                update,
                meta,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("room actor gone"))?;
        rx.await.map_err(|_| anyhow::anyhow!("room actor dropped reply"))?
    }

    pub async fn leave(&self) {
        let _ = self.cmd_tx.send(RoomCommand::Leave { session_id: self.session_id }).await;
    }
}

/// Process-wide registry mapping room id to the set of live sessions.
/// Implementations own the per-room CRDT replica's lifecycle
/// (creation on first join, teardown after the last leave).
#[async_trait]
pub trait RoomHub: Send + Sync {
    /// Registers `session_id` with `room_id`, creating (and hydrating)
    /// the room if this is the first session to join. `outbox` receives
    /// every frame broadcast to the room except ones this session itself
    /// produced, plus control messages. Returns a handle for issuing
    /// further requests against the room, and the encoded state vector
    /// of the document as it stood at join time (for the initial sync).
    async fn join(
        &self,
        room_id: &str,
        session_id: Uuid,
        outbox: mpsc::Sender<OutboundMessage>,
    ) -> anyhow::Result<(RoomHandle, Vec<u8>)>;

    /// Delivers `message` to every session currently registered for
    /// `room_id`. No-op if the room has no live replica (e.g. every
    /// session already disconnected).
    async fn send_control(&self, room_id: &str, message: ControlMessage) -> anyhow::Result<()>;
}
