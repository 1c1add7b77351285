// src/client/api.rs
use crate::models::auth::ErrorResponse;
use crate::models::chat::{
    Conversation, CreateConversationRequest, DeleteConversationResponse, Message,
    SendMessageRequest, SendMessageResponse,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Well above the server's completion timeout, so a provider timeout
/// reaches the client as a 502 rather than as a dropped request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a call to the chat server failed, classified by how far it got.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The server answered with an error status.
    #[error("server responded with {status}: {message}")]
    Server { status: u16, message: String },
    /// The request went out but no response came back (includes timeouts).
    #[error("no response from server: {0}")]
    Connectivity(String),
    /// The request could not be built or sent at all.
    #[error("request could not be sent: {0}")]
    Local(String),
}

impl ApiError {
    /// Human-readable cause shown next to a failed message.
    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::Server { status: 401 | 403, .. } => "Authentication error. Please log in again.",
            ApiError::Server { status: 500..=599, .. } => "Server error. Please try again later.",
            ApiError::Server { .. } => "Failed to send message. Please try again.",
            ApiError::Connectivity(_) => "No response from server. Please check your connection.",
            ApiError::Local(_) => "Failed to send message. Please try again.",
        }
    }

    /// True when the server saved the user message but could not produce a
    /// reply, so a retry must only ask for the reply.
    pub fn reply_pending(&self) -> bool {
        matches!(self, ApiError::Server { status: 502, .. })
    }

    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_builder() {
            ApiError::Local(e.to_string())
        } else {
            ApiError::Connectivity(e.to_string())
        }
    }
}

/// Operations the client engine needs from the chat server.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation, ApiError>;
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ApiError>;
    async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendMessageResponse, ApiError>;
    async fn resume_reply(&self, conversation_id: Uuid) -> Result<SendMessageResponse, ApiError>;
    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), ApiError>;
}

/// `ChatApi` over HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChatApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, token, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Local(e.to_string()))?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/chat{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
            let message = response
                .json::<ErrorResponse>()
                .await
                .map(|body| body.message)
                .unwrap_or(fallback);
            tracing::warn!(status = status.as_u16(), %message, "chat server returned an error");
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Connectivity(e.to_string())
            } else {
                ApiError::Server {
                    status: status.as_u16(),
                    message: format!("malformed response body: {}", e),
                }
            }
        })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation, ApiError> {
        let body = CreateConversationRequest {
            title: title.map(str::to_string),
        };
        self.execute(self.client.post(self.url("/conversations")).json(&body))
            .await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.execute(self.client.get(self.url("/conversations"))).await
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ApiError> {
        let path = format!("/conversations/{}/messages", conversation_id);
        self.execute(self.client.get(self.url(&path))).await
    }

    async fn send_message(
        &self,
        conversation_id: Uuid,
        content: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        let path = format!("/conversations/{}/messages", conversation_id);
        let body = SendMessageRequest {
            content: content.to_string(),
        };
        self.execute(self.client.post(self.url(&path)).json(&body)).await
    }

    async fn resume_reply(&self, conversation_id: Uuid) -> Result<SendMessageResponse, ApiError> {
        let path = format!("/conversations/{}/reply", conversation_id);
        self.execute(self.client.post(self.url(&path))).await
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<(), ApiError> {
        let path = format!("/conversations/{}", conversation_id);
        let _: DeleteConversationResponse = self.execute(self.client.delete(self.url(&path))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bearer, spawn_app, test_state, ScriptedCompletion};
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::Arc;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_user_messages_by_origin() {
        let auth = ApiError::Server { status: 401, message: String::new() };
        let forbidden = ApiError::Server { status: 403, message: String::new() };
        let fault = ApiError::Server { status: 500, message: String::new() };
        let other = ApiError::Server { status: 404, message: String::new() };

        assert_eq!(auth.user_message(), "Authentication error. Please log in again.");
        assert_eq!(forbidden.user_message(), auth.user_message());
        assert_eq!(fault.user_message(), "Server error. Please try again later.");
        assert_eq!(other.user_message(), "Failed to send message. Please try again.");
        assert_eq!(
            ApiError::Connectivity("x".into()).user_message(),
            "No response from server. Please check your connection."
        );
        assert!(ApiError::Server { status: 502, message: String::new() }.reply_pending());
        assert!(!fault.reply_pending());
    }

    #[test]
    fn test_request_timeout_outlasts_completion_timeout() {
        use crate::services::chat_service::DEFAULT_COMPLETION_TIMEOUT;
        assert!(DEFAULT_REQUEST_TIMEOUT >= DEFAULT_COMPLETION_TIMEOUT * 2);
    }

    #[tokio::test]
    async fn test_error_status_is_server_failure_with_body_message() {
        let router = Router::new().route(
            "/api/chat/conversations",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "success": false, "message": "Invalid or expired token" })),
                )
            }),
        );
        let api = HttpChatApi::new(spawn_stub(router).await, None).unwrap();

        let err = api.list_conversations().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 401,
                message: "Invalid or expired token".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_is_connectivity_failure() {
        let router = Router::new().route(
            "/api/chat/conversations",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!([]))
            }),
        );
        let api = HttpChatApi::with_timeout(spawn_stub(router).await, None, Duration::from_millis(100)).unwrap();

        assert!(matches!(api.list_conversations().await, Err(ApiError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_failure() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpChatApi::new(format!("http://{}", addr), None).unwrap();
        assert!(matches!(api.list_conversations().await, Err(ApiError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_unusable_base_url_is_local_failure() {
        let api = HttpChatApi::new("not a url", None).unwrap();
        assert!(matches!(api.list_conversations().await, Err(ApiError::Local(_))));
    }

    #[tokio::test]
    async fn test_round_trip_against_real_router() {
        let base = spawn_app(test_state(Arc::new(ScriptedCompletion::new()))).await;
        let api = HttpChatApi::new(base, Some(bearer(9))).unwrap();

        let conversation = api.create_conversation(Some("Plans")).await.unwrap();
        assert_eq!(conversation.owner_id, 9);

        let sent = api.send_message(conversation.id, "Hello").await.unwrap();
        assert_eq!(sent.user_message.content, "Hello");

        let messages = api.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);

        api.delete_conversation(conversation.id).await.unwrap();
        assert!(api.list_conversations().await.unwrap().is_empty());
    }
}
