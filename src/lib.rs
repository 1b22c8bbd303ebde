pub mod api;
pub mod config;
pub mod model;
pub mod seed;
pub mod store;

pub use api::routes;

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store, StoreError};

use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the API for a store and serve it on an already bound listener.
pub async fn run_server<S: Store + 'static>(store: Arc<S>, listener: TcpListener) -> anyhow::Result<()> {
    let app: axum::Router = api::routes::create_router().with_state(store);

    if let Ok(address) = listener.local_addr() {
        log::info!("hal-chatlog listening on http://{}{}", address, api::hal::API_ROOT);
    }
    axum::serve(listener, app).await?;

    Ok(())
}
