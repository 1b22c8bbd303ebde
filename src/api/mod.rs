pub mod error;
pub mod hal;
pub mod handlers;
pub mod log_handlers;
pub mod message_handlers;
pub mod negotiate;
pub mod pipeline;
pub mod resolve;
pub mod routes;
pub mod user_handlers;

pub use error::{Allow, ApiError, ApiResult};
pub use handlers::AppState;
pub use routes::*;
