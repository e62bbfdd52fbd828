use std::sync::Arc;

use crate::application::ports::permission_repository::PermissionRepository;
use crate::application::ports::rate_limiter::RateLimiter;
use crate::application::ports::room_hub::RoomHub;
use crate::application::ports::update_store::UpdateStore;
use crate::application::services::permission_resolver::PermissionResolver;
use crate::bootstrap::config::Config;
use crate::infrastructure::db::PgPool;

/// Process-wide handles wired once at startup and shared (via `Arc`)
/// across every WebSocket connection's task, split between plain config
/// and `Arc`-shared service handles.
#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    pool: PgPool,
    services: Arc<AppServices>,
}

struct AppServices {
    permission_repo: Arc<dyn PermissionRepository>,
    permission_resolver: PermissionResolver,
    update_store: Arc<dyn UpdateStore>,
    room_hub: Arc<dyn RoomHub>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AppContext {
    pub fn new(
        cfg: Config,
        pool: PgPool,
        permission_repo: Arc<dyn PermissionRepository>,
        update_store: Arc<dyn UpdateStore>,
        room_hub: Arc<dyn RoomHub>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let permission_resolver = PermissionResolver::new(permission_repo.clone());
        Self {
            cfg,
            pool,
            services: Arc::new(AppServices {
                permission_repo,
                permission_resolver,
                update_store,
                room_hub,
                rate_limiter,
            }),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn permission_repo(&self) -> &Arc<dyn PermissionRepository> {
        &self.services.permission_repo
    }

    pub fn permission_resolver(&self) -> &PermissionResolver {
        &self.services.permission_resolver
    }

    pub fn update_store(&self) -> &Arc<dyn UpdateStore> {
        &self.services.update_store
    }

    pub fn room_hub(&self) -> &Arc<dyn RoomHub> {
        &self.services.room_hub
    }

    pub fn rate_limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.services.rate_limiter
    }
}
