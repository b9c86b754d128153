//! Chat message API endpoints
//!
//! Conversations are stored server-side; clients poll the unread count.
//! All routes require authentication.
//!
//! - POST /api/v1/messages - Send a message
//! - GET /api/v1/messages - Conversation summaries
//! - GET /api/v1/messages/unread-count - Unread counter
//! - GET /api/v1/messages/{user_id} - Conversation with a user (marks
//!   incoming messages read)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ConversationSummary, Message};

/// Request body for sending a message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    pub content: String,
}

/// A single message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub read: bool,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id,
            recipient_id: m.recipient_id,
            content: m.content,
            read: m.read,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Paged conversation
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub messages: Vec<MessageResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Unread counter, polled by clients
#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// Build the message router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message))
        .route("/", get(list_conversations))
        .route("/unread-count", get(unread_count))
        .route("/{user_id}", get(get_conversation))
}

/// POST /api/v1/messages - Send a message
async fn send_message(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let message = state
        .message_service
        .send(user.id, body.recipient_id, &body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// GET /api/v1/messages - Conversation summaries, most recent first
async fn list_conversations(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let summaries = state.message_service.summaries(user.id).await?;
    Ok(Json(summaries))
}

/// GET /api/v1/messages/unread-count
async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.message_service.unread_count(user.id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// GET /api/v1/messages/{user_id} - Conversation with another user
///
/// Marks incoming messages from that user as read.
async fn get_conversation(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(peer_id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let page = state
        .message_service
        .conversation(user.id, peer_id, query.params())
        .await?;

    Ok(Json(ConversationResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        messages: page.items.into_iter().map(MessageResponse::from).collect(),
    }))
}
