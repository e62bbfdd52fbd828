use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::EditorRole;

/// Minimal attributes of a page/project/org needed to resolve access,
/// loaded in a single query by the caller (Tier-0 creator check is an
/// attribute comparison, not a query).
#[derive(Debug, Clone)]
pub struct PageContext {
    pub page_id: Uuid,
    pub project_id: Uuid,
    pub project_creator_id: Uuid,
    pub org_id: Uuid,
    pub org_members_can_access: bool,
}

/// Read-only access to the org/project/page membership tables.
///
/// Each method below is exactly one query, and corresponds to exactly
/// one tier of [`PermissionResolver`](super::super::services::permission_resolver::PermissionResolver).
/// Tier 0 (admin) and Tier 1 (member) both read `org_members` but as two
/// distinct queries, matching the short-circuit query-count baselines in
/// creator 0 queries, org admin 1, org member 2, project editor 3,
/// page editor / outsider 4.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Loads the (page, project, org) attributes needed to evaluate
    /// access, or `None` if the page doesn't exist or is soft-deleted.
    /// Not counted against the tier query baselines (it is the lookup
    /// that produces their input, analogous to the ORM fetching the
    /// page/project/org rows before permission functions run).
    async fn page_context(&self, page_external_id: &str) -> anyhow::Result<Option<PageContext>>;

    /// Tier 0. True iff `user_id` has an `admin` row in `org_members`
    /// for `org_id`.
    async fn org_is_admin(&self, org_id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;

    /// Tier 1. True iff `user_id` has any `org_members` row (admin or
    /// member) for `org_id`.
    async fn org_is_member(&self, org_id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;

    /// Tier 2.
    async fn project_editor_role(&self, project_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<EditorRole>>;

    /// Tier 3.
    async fn page_editor_role(&self, page_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<EditorRole>>;
}
