// src/handlers/mod.rs
use crate::middleware::logging::request_logging_middleware;
use crate::AppState;
use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod chat;
pub mod status;

/// Full HTTP surface with shared state, request logging and CORS applied.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(chat::chat_routes())
        .merge(status::status_routes())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}
