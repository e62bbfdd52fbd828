use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::stream::BoxStream;

/// A single persisted CRDT update, as returned by [`UpdateStore::read_all`].
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub update: Vec<u8>,
    pub meta: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// A persisted CRDT update with its assigned id, as returned by
/// [`UpdateStore::read_since`].
#[derive(Debug, Clone)]
pub struct UpdateRecordWithId {
    pub id: i64,
    pub update: Vec<u8>,
    pub meta: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub snapshot: Vec<u8>,
    pub last_update_id: i64,
}

/// Append-only log of CRDT updates and periodic snapshots, keyed by room id.
///
/// Ids are assigned per-room and are strictly increasing but not required
/// to be gap-free. Update records are immutable once written; pruning is
/// the only permitted removal, and only for ids `<= last_update_id` of a
/// saved snapshot.
#[async_trait]
pub trait UpdateStore: Send + Sync {
    /// Inserts an update and returns its assigned id. The id is strictly
    /// greater than any id previously assigned to `room_id`.
    async fn append(&self, room_id: &str, update: &[u8], meta: &[u8]) -> anyhow::Result<i64>;

    /// All updates for the room in id order. Streaming: must not
    /// materialize the whole log for large rooms.
    async fn read_all(&self, room_id: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<UpdateRecord>>>;

    /// Updates with `id > last_inclusive_id`, in id order.
    async fn read_since(
        &self,
        room_id: &str,
        last_inclusive_id: i64,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<UpdateRecordWithId>>>;

    /// Highest id currently stored for the room, or 0 if empty.
    async fn get_max_id(&self, room_id: &str) -> anyhow::Result<i64>;

    async fn get_snapshot(&self, room_id: &str) -> anyhow::Result<Option<SnapshotRecord>>;

    /// Replaces the room's snapshot. Callers MUST enforce the
    /// "non-trivial" invariant (`snapshot.len() > 2`) themselves; this
    /// port does not reject short snapshots (see Hydrator/RoomActor,
    /// which own that check).
    async fn upsert_snapshot(&self, room_id: &str, snapshot: &[u8], last_update_id: i64) -> anyhow::Result<()>;

    /// Deletes update records with `id <= last_update_id`. Idempotent.
    async fn prune_before(&self, room_id: &str, last_update_id: i64) -> anyhow::Result<u64>;
}

/// A snapshot byte string shorter than this is the empty-document
/// sentinel and must never be persisted or trusted on read.
pub const MIN_VALID_SNAPSHOT_LEN: usize = 3;

pub fn is_snapshot_valid(bytes: &[u8]) -> bool {
    bytes.len() >= MIN_VALID_SNAPSHOT_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_two_byte_snapshots() {
        assert!(!is_snapshot_valid(b""));
        assert!(!is_snapshot_valid(b"\x00"));
        assert!(!is_snapshot_valid(b"\x00\x00"));
        assert!(is_snapshot_valid(b"\x00\x00\x00"));
    }
}
