use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::application::ports::permission_repository::{PageContext, PermissionRepository};
use crate::domain::EditorRole;
use crate::infrastructure::db::PgPool;

pub struct SqlxPermissionRepository {
    pool: PgPool,
}

impl SqlxPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for SqlxPermissionRepository {
    async fn page_context(&self, page_external_id: &str) -> anyhow::Result<Option<PageContext>> {
        let row = sqlx::query(
            "SELECT p.id AS page_id, pr.id AS project_id, pr.creator_id AS project_creator_id,
                    pr.org_id AS org_id, pr.org_members_can_access AS org_members_can_access
             FROM pages p
             JOIN projects pr ON pr.id = p.project_id
             WHERE p.external_id = $1 AND p.deleted_at IS NULL AND pr.deleted_at IS NULL",
        )
        .bind(page_external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| PageContext {
            page_id: row.get("page_id"),
            project_id: row.get("project_id"),
            project_creator_id: row.get("project_creator_id"),
            org_id: row.get("org_id"),
            org_members_can_access: row.get("org_members_can_access"),
        }))
    }

    async fn org_is_admin(&self, org_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM org_members WHERE org_id = $1 AND user_id = $2 AND role = 'admin'",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn org_is_member(&self, org_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM org_members WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn project_editor_role(&self, project_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<EditorRole>> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM project_editors WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role.and_then(|r| EditorRole::from_db(&r)))
    }

    async fn page_editor_role(&self, page_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<EditorRole>> {
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM page_editors WHERE page_id = $1 AND user_id = $2",
        )
        .bind(page_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role.and_then(|r| EditorRole::from_db(&r)))
    }
}
