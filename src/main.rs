use std::net::SocketAddr;
use std::sync::Arc;

use collab_server::application::ports::permission_repository::PermissionRepository;
use collab_server::application::ports::rate_limiter::RateLimiter;
use collab_server::application::ports::room_hub::RoomHub;
use collab_server::application::ports::update_store::UpdateStore;
use collab_server::bootstrap::app_context::AppContext;
use collab_server::bootstrap::config::Config;
use collab_server::infrastructure::db::repositories::permission_repository_sqlx::SqlxPermissionRepository;
use collab_server::infrastructure::db::repositories::update_store_sqlx::SqlxUpdateStore;
use collab_server::infrastructure::rate_limit::{InMemoryRateLimiter, RedisRateLimiter};
use collab_server::infrastructure::realtime::local_hub::LocalRoomHub;
use collab_server::infrastructure::realtime::redis_backplane::RedisBackplane;
use collab_server::infrastructure::db;
use collab_server::presentation::{http, ws};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config::from_env()?;

    let pool = db::connect_pool(&cfg.database_url).await?;
    db::migrate(&pool).await?;

    let permission_repo: Arc<dyn PermissionRepository> = Arc::new(SqlxPermissionRepository::new(pool.clone()));
    let update_store: Arc<dyn UpdateStore> = Arc::new(SqlxUpdateStore::new(pool.clone()));

    let local_hub = LocalRoomHub::new(update_store.clone(), cfg.snapshot_policy());
    let (room_hub, rate_limiter): (Arc<dyn RoomHub>, Arc<dyn RateLimiter>) = match &cfg.redis_url {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url.as_str())?;
            let hub = Arc::new(RedisBackplane::new(local_hub, client.clone()));
            let limiter = Arc::new(RedisRateLimiter::new(client));
            (hub, limiter)
        }
        None => {
            tracing::warn!("REDIS_URL not set: running with in-process room fanout and rate limiting only");
            (Arc::new(local_hub), Arc::new(InMemoryRateLimiter::default()))
        }
    };
    let ctx = AppContext::new(cfg.clone(), pool.clone(), permission_repo, update_store, room_hub, rate_limiter);

    let cors = match &cfg.frontend_url {
        Some(origin) => CorsLayer::new().allow_origin(origin.parse::<http::HeaderValue>()?).allow_methods(Any),
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any),
    };

    let app = axum::Router::new()
        .merge(http::health::routes(pool))
        .merge(ws::routes(ctx))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    tracing::info!(%addr, "collab_server_listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
