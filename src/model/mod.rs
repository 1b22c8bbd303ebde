pub mod chat_log;
pub mod common;
pub mod message;
pub mod user;

pub use chat_log::*;
pub use common::*;
pub use message::*;
pub use user::*;
