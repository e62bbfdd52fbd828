use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::stream::BoxStream;
use futures_util::TryStreamExt;
use sqlx::Row;

use crate::application::ports::update_store::{
    SnapshotRecord, UpdateRecord, UpdateRecordWithId, UpdateStore,
};
use crate::infrastructure::db::PgPool;

pub struct SqlxUpdateStore {
    pool: PgPool,
}

impl SqlxUpdateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UpdateStore for SqlxUpdateStore {
    async fn append(&self, room_id: &str, update: &[u8], meta: &[u8]) -> anyhow::Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO page_updates (room_id, update, meta) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(room_id)
        .bind(update)
        .bind(meta)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Streams rows off a live cursor rather than buffering the room's
    /// whole update log into a `Vec` first: `pool` is cloned into the
    /// generator so the returned stream can outlive this call and still
    /// drive its own `fetch()` lazily, one row at a time.
    async fn read_all(&self, room_id: &str) -> anyhow::Result<BoxStream<'static, anyhow::Result<UpdateRecord>>> {
        let pool = self.pool.clone();
        let room_id = room_id.to_string();
        let stream = async_stream::try_stream! {
            let mut rows = sqlx::query("SELECT update, meta, created_at FROM page_updates WHERE room_id = $1 ORDER BY id ASC")
                .bind(room_id)
                .fetch(&pool);
            while let Some(row) = rows.try_next().await? {
                yield UpdateRecord {
                    update: row.try_get::<Vec<u8>, _>("update")?,
                    meta: row.try_get::<Vec<u8>, _>("meta")?,
                    timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
                };
            }
        };
        Ok(Box::pin(stream))
    }

    async fn read_since(
        &self,
        room_id: &str,
        last_inclusive_id: i64,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<UpdateRecordWithId>>> {
        let pool = self.pool.clone();
        let room_id = room_id.to_string();
        let stream = async_stream::try_stream! {
            let mut rows = sqlx::query(
                "SELECT id, update, meta, created_at FROM page_updates WHERE room_id = $1 AND id > $2 ORDER BY id ASC",
            )
            .bind(room_id)
            .bind(last_inclusive_id)
            .fetch(&pool);
            while let Some(row) = rows.try_next().await? {
                yield UpdateRecordWithId {
                    id: row.try_get::<i64, _>("id")?,
                    update: row.try_get::<Vec<u8>, _>("update")?,
                    meta: row.try_get::<Vec<u8>, _>("meta")?,
                    timestamp: row.try_get::<DateTime<Utc>, _>("created_at")?,
                };
            }
        };
        Ok(Box::pin(stream))
    }

    async fn get_max_id(&self, room_id: &str) -> anyhow::Result<i64> {
        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM page_updates WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(max_id.unwrap_or(0))
    }

    async fn get_snapshot(&self, room_id: &str) -> anyhow::Result<Option<SnapshotRecord>> {
        let row = sqlx::query("SELECT snapshot, last_update_id FROM page_snapshots WHERE room_id = $1")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| SnapshotRecord {
            snapshot: row.get("snapshot"),
            last_update_id: row.get("last_update_id"),
        }))
    }

    async fn upsert_snapshot(&self, room_id: &str, snapshot: &[u8], last_update_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO page_snapshots (room_id, snapshot, last_update_id) VALUES ($1, $2, $3)
             ON CONFLICT (room_id) DO UPDATE SET snapshot = EXCLUDED.snapshot, last_update_id = EXCLUDED.last_update_id, created_at = now()",
        )
        .bind(room_id)
        .bind(snapshot)
        .bind(last_update_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn prune_before(&self, room_id: &str, last_update_id: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM page_updates WHERE room_id = $1 AND id <= $2")
            .bind(room_id)
            .bind(last_update_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
