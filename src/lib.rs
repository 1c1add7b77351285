// lib.rs - chat service library: server pipeline and client reconciliation
pub mod client;
pub mod completion_client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::ChatError;
pub use services::{ChatService, ChatSettings};

/// Shared state handed to every handler through an `Extension` layer.
pub struct AppState {
    pub chat: services::ChatService,
    pub jwt_secret: String,
}
