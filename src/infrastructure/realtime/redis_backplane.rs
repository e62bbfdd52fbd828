use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::ports::room_hub::{ControlMessage, OutboundMessage, RoomHandle, RoomHub};
use crate::infrastructure::realtime::local_hub::LocalRoomHub;

const CHANNEL_PREFIX: &str = "collab:control:";

/// Wire payload for the Redis channel: tags the message with the
/// publishing process's `origin` so that process's own subscriber loop
/// (which receives its own publish back via `PSUBSCRIBE`) can recognize
/// and skip it, rather than relaying it into `local` a second time on
/// top of the direct call `send_control` already made.
#[derive(Serialize, Deserialize)]
struct Envelope {
    origin: Uuid,
    message: ControlMessage,
}

/// Cross-process fan-out for [`RoomHub::send_control`]: publishes every
/// control message to a Redis pub/sub channel keyed by room id, and
/// relays messages other processes publish into this process's
/// [`LocalRoomHub`]. `join`/`SyncStep1`/`ApplyUpdate` stay entirely local
/// — each process keeps its own CRDT replica; only control-plane
/// notifications (access revocation, link updates) cross the process
/// boundary.
#[derive(Clone)]
pub struct RedisBackplane {
    local: LocalRoomHub,
    client: redis::Client,
    origin: Uuid,
}

impl RedisBackplane {
    pub fn new(local: LocalRoomHub, client: redis::Client) -> Self {
        let backplane = Self { local, client, origin: Uuid::new_v4() };
        backplane.spawn_subscriber();
        backplane
    }

    fn channel(room_id: &str) -> String {
        format!("{CHANNEL_PREFIX}{room_id}")
    }

    fn spawn_subscriber(&self) {
        let client = self.client.clone();
        let local = self.local.clone();
        let origin = self.origin;
        tokio::spawn(async move {
            loop {
                match client.get_async_connection().await {
                    Ok(conn) => {
                        let mut pubsub = conn.into_pubsub();
                        if let Err(e) = pubsub.psubscribe(format!("{CHANNEL_PREFIX}*")).await {
                            tracing::error!(error = ?e, "redis_backplane_subscribe_failed");
                            continue;
                        }
                        let mut stream = pubsub.on_message();
                        while let Some(msg) = stream.next().await {
                            let channel: String = msg.get_channel_name().to_string();
                            let Some(room_id) = channel.strip_prefix(CHANNEL_PREFIX) else { continue };
                            let payload: Vec<u8> = match msg.get_payload() {
                                Ok(p) => p,
                                Err(e) => {
                                    tracing::warn!(error = ?e, "redis_backplane_bad_payload");
                                    continue;
                                }
                            };
                            let Ok(envelope) = serde_json::from_slice::<Envelope>(&payload) else {
                                continue;
                            };
                            if envelope.origin == origin {
                                // Published by this same process: send_control already
                                // delivered it to `local` directly.
                                continue;
                            }
                            if let Err(e) = local.send_control(room_id, envelope.message).await {
                                tracing::warn!(room_id, error = ?e, "redis_backplane_local_relay_failed");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "redis_backplane_connect_failed");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl RoomHub for RedisBackplane {
    async fn join(
        &self,
        room_id: &str,
        session_id: Uuid,
        outbox: mpsc::Sender<OutboundMessage>,
    ) -> anyhow::Result<(RoomHandle, Vec<u8>)> {
        self.local.join(room_id, session_id, outbox).await
    }

    async fn send_control(&self, room_id: &str, message: ControlMessage) -> anyhow::Result<()> {
        self.local.send_control(room_id, message.clone()).await?;
        let mut conn = self.client.get_async_connection().await?;
        let payload = serde_json::to_vec(&Envelope { origin: self.origin, message })?;
        let _: i64 = redis::cmd("PUBLISH")
            .arg(Self::channel(room_id))
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
