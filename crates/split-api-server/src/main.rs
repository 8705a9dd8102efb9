use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use split_api_server::app::build_router;
use split_api_server::auth::JwtManager;
use split_api_server::cleanup;
use split_api_server::config::Settings;
use split_api_server::database::{DbPool, PgSessionStore, SessionStore};
use split_api_server::security::SessionAccess;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,split_api_server=debug".to_string()),
        )
        .with_target(true)
        .json()
        .init();

    info!("Starting split API server...");

    // Load configuration
    let settings = Arc::new(Settings::load()?);
    info!("Configuration loaded");

    // Initialize database pool and schema
    let db_pool = DbPool::new(&settings.database).await?;
    info!("Database connection established");

    let pg_store = PgSessionStore::new(db_pool);
    pg_store.ensure_schema().await?;

    let store: Arc<dyn SessionStore> = Arc::new(pg_store);
    let access = Arc::new(SessionAccess::new(store.clone()));
    let jwt_manager = Arc::new(JwtManager::new(
        &settings.auth.jwt_secret,
        settings.auth.token_expiry_hours,
    ));

    // Background sweep for expired sessions
    tokio::spawn(cleanup::run_cleanup_loop(
        store.clone(),
        settings.session.cleanup_interval_hours,
    ));

    // Build router
    let app = build_router(store, access, jwt_manager, settings.clone());

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
