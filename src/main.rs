use hal_chatlog::config::{AppConfig, StoreBackend};
use hal_chatlog::store::{MemoryStore, PostgresStore, Store};
use hal_chatlog::{run_server, seed};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{} backend={:?}",
        config.server.host,
        config.server.port,
        config.database.backend
    );

    match config.database.backend {
        StoreBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            store.migrate().await?;

            start(Arc::new(store), &config).await
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store; data is lost on shutdown");
            start(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn start<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(store.as_ref()).await?;
    }

    let listener = TcpListener::bind(config.server_address()).await?;
    run_server(store, listener).await
}
