// Workspace RBAC API Server
// HTTP surface over the authorization gate

mod config;
mod error;
mod extract;
mod handlers;
mod middleware;
mod routes;

use anyhow::Context;
use crate::config::{Config, StorageBackend};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;
use wsrbac_authz::{AuthorizationGate, GateConfig, RoleRegistry};
use wsrbac_cache::Cache;
use wsrbac_database::{Database, MemoryStorage, PgStorage, Storage};

pub struct AppState {
    pub gate: AuthorizationGate,
    pub jwt: wsrbac_auth::JwtService,
    /// Users already mirrored into storage by this process.
    pub known_users: moka::future::Cache<Uuid, ()>,
}

impl AppState {
    pub fn new(gate: AuthorizationGate, jwt: wsrbac_auth::JwtService, known_user_capacity: u64) -> Self {
        Self {
            gate,
            jwt,
            known_users: moka::future::Cache::new(known_user_capacity),
        }
    }
}

async fn open_storage(config: &Config) -> anyhow::Result<(Arc<dyn Storage>, RoleRegistry)> {
    match config.server.storage {
        StorageBackend::Postgres => {
            tracing::info!("🗄️  Connecting to database...");
            let database = Database::new(config.database.clone())
                .await
                .context("Failed to connect to database")?;
            database.ping().await.context("Database ping failed")?;
            tracing::info!("✅ Database connected");

            let storage = PgStorage::new(database);
            let registry = RoleRegistry::load(&storage).await?;
            Ok((Arc::new(storage), registry))
        }
        StorageBackend::Memory => {
            tracing::warn!("🧪 Using in-memory storage, nothing will be persisted");
            let storage = MemoryStorage::seeded();
            let registry = RoleRegistry::load(&storage).await?;
            Ok((Arc::new(storage), registry))
        }
    }
}

async fn build_gate(config: &Config) -> anyhow::Result<AuthorizationGate> {
    let (storage, registry) = open_storage(config).await?;
    let registry = Arc::new(registry);
    let gate_config: GateConfig = config.gate.clone();

    if config.cache.redis_url.is_some() {
        tracing::info!("⚡ Connecting to Redis...");
        let cache = Cache::new(config.cache.clone())
            .await
            .context("Failed to connect to Redis")?;
        cache.ping().await.context("Redis ping failed")?;
        tracing::info!("✅ Redis connected");
        Ok(AuthorizationGate::with_cache(storage, registry, cache, gate_config))
    } else {
        Ok(AuthorizationGate::new(storage, registry, gate_config))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wsrbac_api=debug,tower_http=debug"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("🚀 Starting workspace RBAC API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!("🔌 Server: {}:{}", config.server.host, config.server.port);

    let gate = build_gate(&config).await?;
    tracing::info!(
        precheck = gate.config().precheck,
        "🛡️  Authorization gate initialized"
    );

    let jwt = wsrbac_auth::JwtService::from_env().context("Failed to initialize JWT service")?;
    tracing::info!("🔐 JWT service initialized");

    let state = Arc::new(AppState::new(gate, jwt, config.server.known_user_capacity));

    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
