//! Idgate server entry point.
//!
//! Loads configuration, connects Postgres and the cache, wires the
//! session service, and keeps the permission cache subscribed to role
//! change events until shutdown.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use idgate_auth::{PermissionResolver, SessionService, TokenIssuer};
use idgate_cache::CacheManager;
use idgate_core::config::AppConfig;
use idgate_core::error::AppError;
use idgate_core::events::BroadcastEventBus;
use idgate_database::{
    DatabasePool, PgCredentialVerifier, PgIdentityDirectory, PgRoleStore, PgSessionRepository,
    migration,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file, environment overlay, and `IDGATE_*`
/// environment variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("IDGATE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let env = std::env::var("IDGATE_ENV").unwrap_or_else(|_| "development".to_string());
    let overlay = format!("config/{env}.toml");

    AppConfig::load(&config_path, Some(&overlay))
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Idgate v{}", env!("CARGO_PKG_VERSION"));

    let database = DatabasePool::connect(&config.database).await?;
    migration::run_migrations(database.pool()).await?;

    let cache = CacheManager::new(&config.cache).await?;

    let events = Arc::new(BroadcastEventBus::new());
    let repository = Arc::new(PgSessionRepository::new(database.pool().clone()));
    let directory = Arc::new(PgIdentityDirectory::new(database.pool().clone()));
    let credentials = Arc::new(PgCredentialVerifier::new(database.pool().clone()));
    let role_store = Arc::new(PgRoleStore::new(database.pool().clone()));

    let resolver =
        PermissionResolver::new(role_store, cache, config.session.permission_cache_ttl());
    let issuer = TokenIssuer::new(&config.auth);

    let service = SessionService::new(
        repository,
        directory,
        credentials,
        events.clone(),
        issuer,
        resolver,
    );

    // Role permission changes drop the affected cache entries.
    let invalidator = service.permission_resolver().clone();
    let role_events = events.subscribe();
    let invalidation = tokio::spawn(async move {
        invalidator.run_invalidation(role_events).await;
    });

    tracing::info!(
        store_timeout_ms = config.session.store_timeout().as_millis() as u64,
        "Idgate session core ready"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {e}")))?;

    tracing::info!("Shutdown signal received");
    invalidation.abort();
    database.close().await;

    Ok(())
}
