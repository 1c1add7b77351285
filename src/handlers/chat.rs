// src/handlers/chat.rs
use crate::error::ChatError;
use crate::middleware::auth::auth_middleware;
use crate::models::auth::AuthUser;
use crate::models::chat::{
    Conversation, CreateConversationRequest, DeleteConversationResponse, Message,
    SendMessageRequest, SendMessageResponse,
};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn chat_routes() -> Router {
    Router::new()
        .route(
            "/api/chat/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/api/chat/conversations/:conversation_id", delete(delete_conversation))
        .route(
            "/api/chat/conversations/:conversation_id/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chat/conversations/:conversation_id/reply", post(resume_reply))
        .layer(axum::middleware::from_fn(auth_middleware))
}

fn parse_conversation_id(raw: &str) -> Result<Uuid, ChatError> {
    Uuid::parse_str(raw)
        .map_err(|_| ChatError::ValidationFailed(format!("Invalid conversation id '{}'", raw)))
}

async fn create_conversation(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Option<Json<CreateConversationRequest>>,
) -> Result<(StatusCode, Json<Conversation>), ChatError> {
    let title = payload.and_then(|Json(req)| req.title);
    let conversation = state.chat.create_conversation(user.id, title.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn list_conversations(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Conversation>>, ChatError> {
    Ok(Json(state.chat.list_conversations(user.id).await?))
}

async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ChatError> {
    let conversation_id = parse_conversation_id(&conversation_id)?;
    Ok(Json(state.chat.list_messages(user.id, conversation_id).await?))
}

async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ChatError> {
    let conversation_id = parse_conversation_id(&conversation_id)?;
    tracing::info!(
        conversation_id = %conversation_id,
        user_id = user.id,
        content_len = payload.content.len(),
        "💬 message received"
    );

    let result = state
        .chat
        .send_message(user.id, conversation_id, &payload.content)
        .await?;
    Ok(Json(result))
}

async fn resume_reply(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<SendMessageResponse>, ChatError> {
    let conversation_id = parse_conversation_id(&conversation_id)?;
    Ok(Json(state.chat.resume_reply(user.id, conversation_id).await?))
}

async fn delete_conversation(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Result<Json<DeleteConversationResponse>, ChatError> {
    let conversation_id = parse_conversation_id(&conversation_id)?;
    state.chat.delete_conversation(user.id, conversation_id).await?;
    Ok(Json(DeleteConversationResponse {
        success: true,
        message: "Conversation deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::models::auth::ErrorResponse;
    use crate::models::chat::{Conversation, Message, MessageRole, SendMessageResponse};
    use crate::completion_client::CompletionError;
    use crate::test_support::{bearer, spawn_app, test_state, ScriptedCompletion};
    use reqwest::{Client, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    async fn create(client: &Client, base: &str, token: &str) -> Conversation {
        client
            .post(format!("{}/api/chat/conversations", base))
            .bearer_auth(token)
            .json(&json!({ "title": "Greetings" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_requests_without_token_are_unauthorized() {
        let base = spawn_app(test_state(Arc::new(ScriptedCompletion::new()))).await;
        let client = Client::new();

        let response = client
            .get(format!("{}/api/chat/conversations", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = client
            .get(format!("{}/api/chat/conversations", base))
            .header("Authorization", "Token nope")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_send_round_trip_over_http() {
        let base = spawn_app(test_state(Arc::new(ScriptedCompletion::new()))).await;
        let client = Client::new();
        let token = bearer(1);

        let response = client
            .post(format!("{}/api/chat/conversations", base))
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let conversation: Conversation = response.json().await.unwrap();
        assert_eq!(conversation.title, "New Conversation");

        let sent: SendMessageResponse = client
            .post(format!("{}/api/chat/conversations/{}/messages", base, conversation.id))
            .bearer_auth(&token)
            .json(&json!({ "content": "Hello" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(sent.user_message.content, "Hello");
        assert_eq!(sent.assistant_message.role, MessageRole::Assistant);
        assert!(!sent.assistant_message.content.is_empty());

        let messages: Vec<Message> = client
            .get(format!("{}/api/chat/conversations/{}/messages", base, conversation.id))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(messages, vec![sent.user_message, sent.assistant_message]);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let completion = Arc::new(ScriptedCompletion::new());
        let base = spawn_app(test_state(completion.clone())).await;
        let client = Client::new();
        let owner = bearer(1);
        let stranger = bearer(2);
        let conversation = create(&client, &base, &owner).await;
        let messages_url = format!("{}/api/chat/conversations/{}/messages", base, conversation.id);

        let empty = client
            .post(&messages_url)
            .bearer_auth(&owner)
            .json(&json!({ "content": "  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = empty.json().await.unwrap();
        assert!(!body.success);

        let foreign = client
            .post(&messages_url)
            .bearer_auth(&stranger)
            .json(&json!({ "content": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

        let malformed = client
            .get(format!("{}/api/chat/conversations/not-a-uuid/messages", base))
            .bearer_auth(&owner)
            .send()
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        completion.push_reply(Err(CompletionError::Transport("reset".into())));
        let failed = client
            .post(&messages_url)
            .bearer_auth(&owner)
            .json(&json!({ "content": "Hello" }))
            .send()
            .await
            .unwrap();
        assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);

        let resumed: SendMessageResponse = client
            .post(format!("{}/api/chat/conversations/{}/reply", base, conversation.id))
            .bearer_auth(&owner)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resumed.user_message.content, "Hello");
    }

    #[tokio::test]
    async fn test_delete_conversation_over_http() {
        let base = spawn_app(test_state(Arc::new(ScriptedCompletion::new()))).await;
        let client = Client::new();
        let token = bearer(1);
        let conversation = create(&client, &base, &token).await;
        let url = format!("{}/api/chat/conversations/{}", base, conversation.id);

        let foreign = client.delete(&url).bearer_auth(bearer(2)).send().await.unwrap();
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

        let deleted = client.delete(&url).bearer_auth(&token).send().await.unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);

        let listed: Vec<Conversation> = client
            .get(format!("{}/api/chat/conversations", base))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(listed.is_empty());

        let gone = client
            .get(format!("{}/messages", url))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }
}
