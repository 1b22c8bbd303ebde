use axum::{
    routing::{any, MethodRouter},
    Router,
};
use std::sync::Arc;

use crate::api::{handlers, log_handlers, message_handlers, user_handlers};
use crate::store::traits::Store;

/// Every route accepts any verb; the handler's method check answers 405 with
/// the route's `Allow` set instead of the router's bare 405.
pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    let router = Router::new();
    let router = route(router, "/api/v1", any(handlers::api_root::<S>));
    // Users
    let router = route(router, "/api/v1/users", any(user_handlers::users_collection::<S>));
    let router = route(router, "/api/v1/users/:name", any(user_handlers::user_item::<S>));
    // Messages
    let router = route(
        router,
        "/api/v1/messages",
        any(message_handlers::messages_collection::<S>),
    );
    let router = route(
        router,
        "/api/v1/messages/:ref_id",
        any(message_handlers::message_item::<S>),
    );
    // Logs
    let router = route(router, "/api/v1/logs", any(log_handlers::logs_collection::<S>));
    route(router, "/api/v1/logs/:name", any(log_handlers::log_item::<S>))
}

/// Mount `path` and its trailing-slash form on the same handler.
fn route<S: Store + 'static>(
    router: Router<Arc<S>>,
    path: &str,
    handler: MethodRouter<Arc<S>>,
) -> Router<Arc<S>> {
    router
        .route(path, handler.clone())
        .route(&format!("{path}/"), handler)
}
