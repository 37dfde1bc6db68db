use std::sync::Arc;

use anyhow::Context;
use hearth::{AppState, app, auth, config::Config, db, rooms, session::SessionRegistry, session_layer};
use tower_sessions::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hearth=info,tower_http=info")),
        )
        .init();

    let backend = &config.backend;
    tracing::info!(project_id = %backend.project_id, auth_domain = %backend.auth_domain, "starting");
    tracing::debug!(
        storage_bucket = %backend.storage_bucket,
        messaging_sender_id = %backend.messaging_sender_id,
        app_id = %backend.app_id,
        measurement_id = %backend.measurement_id,
        "backend parameters"
    );

    let db_pool = db::connect(&backend.database_url, 16)
        .await
        .with_context(|| format!("opening {}", backend.database_url))?;
    let store = rooms::SqliteMessageStore::new(db_pool);
    let feed = rooms::MessageFeed::open(Arc::new(store)).await?;

    let clients = auth::Clients::from_config(&config).map_err(|err| err.0)?;
    let session_store = MemoryStore::default();
    let app_state = AppState {
        feed,
        identity: Arc::new(clients),
        sessions: SessionRegistry::new(session_store.clone()),
    };

    let secure = config.public_url.starts_with("https://");
    let app = app(
        app_state,
        session_layer(session_store, config.session_idle_minutes, secure),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    tracing::info!(address = %config.bind_address, public_url = %config.public_url, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
