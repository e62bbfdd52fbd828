use std::sync::Arc;

use uuid::Uuid;

use crate::application::ports::permission_repository::{PageContext, PermissionRepository};
use crate::domain::access::AccessLevel;
use crate::domain::EditorRole;

/// Resolves a user's [`AccessLevel`] on a page by walking the org/project/
/// page hierarchy from the top, stopping at the first tier that grants
/// access. Tier order and short-circuiting are load-bearing: they are
/// what makes the query count per tier a testable property, not just an
/// implementation detail.
pub struct PermissionResolver {
    repo: Arc<dyn PermissionRepository>,
}

impl PermissionResolver {
    pub fn new(repo: Arc<dyn PermissionRepository>) -> Self {
        Self { repo }
    }

    /// `ctx` is assumed already loaded (one query, not counted here — see
    /// [`PermissionRepository::page_context`]).
    pub async fn resolve(&self, ctx: &PageContext, user_id: Uuid) -> anyhow::Result<AccessLevel> {
        // Tier -1 (free): the project's or page's creator always has admin
        // access, without touching the repository at all.
        if ctx.project_creator_id == user_id {
            return Ok(AccessLevel::Admin);
        }

        // Tier 0, 1 query.
        if self.repo.org_is_admin(ctx.org_id, user_id).await? {
            return Ok(AccessLevel::Admin);
        }

        // Tier 1, 1 query (2 total).
        if ctx.org_members_can_access && self.repo.org_is_member(ctx.org_id, user_id).await? {
            return Ok(AccessLevel::Editor);
        }

        // Tier 2, 1 query (3 total).
        if let Some(role) = self.repo.project_editor_role(ctx.project_id, user_id).await? {
            return Ok(match role {
                EditorRole::Editor => AccessLevel::Editor,
                EditorRole::Viewer => AccessLevel::Viewer,
            });
        }

        // Tier 3, 1 query (4 total).
        if let Some(role) = self.repo.page_editor_role(ctx.page_id, user_id).await? {
            return Ok(match role {
                EditorRole::Editor => AccessLevel::Editor,
                EditorRole::Viewer => AccessLevel::Viewer,
            });
        }

        Ok(AccessLevel::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRepo {
        queries: AtomicU32,
        admin_of: Mutex<Vec<Uuid>>,
        member_of: Mutex<Vec<Uuid>>,
        project_editor: Mutex<Option<(Uuid, EditorRole)>>,
        page_editor: Mutex<Option<(Uuid, EditorRole)>>,
    }

    #[async_trait]
    impl PermissionRepository for CountingRepo {
        async fn page_context(&self, _page_external_id: &str) -> anyhow::Result<Option<PageContext>> {
            unimplemented!()
        }

        async fn org_is_admin(&self, _org_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.admin_of.lock().unwrap().contains(&user_id))
        }

        async fn org_is_member(&self, _org_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.member_of.lock().unwrap().contains(&user_id))
        }

        async fn project_editor_role(&self, _project_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<EditorRole>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.project_editor.lock().unwrap().filter(|(u, _)| *u == user_id).map(|(_, r)| r))
        }

        async fn page_editor_role(&self, _page_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<EditorRole>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.page_editor.lock().unwrap().filter(|(u, _)| *u == user_id).map(|(_, r)| r))
        }
    }

    fn ctx(project_creator_id: Uuid) -> PageContext {
        PageContext {
            page_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            project_creator_id,
            org_id: Uuid::new_v4(),
            org_members_can_access: true,
        }
    }

    #[tokio::test]
    async fn creator_is_admin_with_zero_queries() {
        let user = Uuid::new_v4();
        let repo = Arc::new(CountingRepo::default());
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&ctx(user), user).await.unwrap();

        assert_eq!(level, AccessLevel::Admin);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn org_admin_is_admin_with_one_query() {
        let user = Uuid::new_v4();
        let c = ctx(Uuid::new_v4());
        let repo = Arc::new(CountingRepo { admin_of: Mutex::new(vec![user]), ..Default::default() });
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::Admin);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn org_member_is_editor_with_two_queries() {
        let user = Uuid::new_v4();
        let c = ctx(Uuid::new_v4());
        let repo = Arc::new(CountingRepo { member_of: Mutex::new(vec![user]), ..Default::default() });
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::Editor);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn org_member_access_requires_org_members_can_access_flag() {
        let user = Uuid::new_v4();
        let mut c = ctx(Uuid::new_v4());
        c.org_members_can_access = false;
        let repo = Arc::new(CountingRepo { member_of: Mutex::new(vec![user]), ..Default::default() });
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::None);
        // org_is_member must still not be called when the flag is off:
        // short-circuit happens on the flag, before the query.
        assert_eq!(repo.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn project_editor_is_resolved_with_three_queries() {
        let user = Uuid::new_v4();
        let c = ctx(Uuid::new_v4());
        let repo = Arc::new(CountingRepo {
            project_editor: Mutex::new(Some((user, EditorRole::Editor))),
            ..Default::default()
        });
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::Editor);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn project_viewer_is_viewer_not_editor() {
        let user = Uuid::new_v4();
        let c = ctx(Uuid::new_v4());
        let repo = Arc::new(CountingRepo {
            project_editor: Mutex::new(Some((user, EditorRole::Viewer))),
            ..Default::default()
        });
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::Viewer);
    }

    #[tokio::test]
    async fn page_editor_is_resolved_with_four_queries() {
        let user = Uuid::new_v4();
        let c = ctx(Uuid::new_v4());
        let repo = Arc::new(CountingRepo {
            page_editor: Mutex::new(Some((user, EditorRole::Editor))),
            ..Default::default()
        });
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::Editor);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn outsider_is_none_with_four_queries() {
        let user = Uuid::new_v4();
        let c = ctx(Uuid::new_v4());
        let repo = Arc::new(CountingRepo::default());
        let resolver = PermissionResolver::new(repo.clone());

        let level = resolver.resolve(&c, user).await.unwrap();

        assert_eq!(level, AccessLevel::None);
        assert_eq!(repo.queries.load(Ordering::SeqCst), 4);
    }
}
