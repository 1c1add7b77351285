// src/handlers/status.rs
use crate::AppState;
use axum::{extract::Extension, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn status_routes() -> Router {
    Router::new().route("/api/status", get(api_status))
}

async fn api_status(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let store_status = if state.chat.store_healthy().await {
        "healthy"
    } else {
        "unhealthy"
    };
    let completion_status = if state.chat.completion_configured() {
        "configured"
    } else {
        "not_configured"
    };
    let settings = state.chat.settings();

    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "store": store_status,
            "completion_provider": completion_status
        },
        "chat": {
            "model": settings.model,
            "context_window": settings.context_window,
            "completion_timeout_secs": settings.completion_timeout.as_secs(),
            "serialize_sends": settings.serialize_sends
        }
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{spawn_app, test_state, ScriptedCompletion};
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_is_public_and_reports_services() {
        let base = spawn_app(test_state(Arc::new(ScriptedCompletion::new()))).await;

        let body: Value = reqwest::get(format!("{}/api/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "operational");
        assert_eq!(body["services"]["store"], "healthy");
        assert_eq!(body["services"]["completion_provider"], "configured");
        assert_eq!(body["chat"]["context_window"], 10);
    }
}
