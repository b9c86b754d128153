//! Notification API endpoints
//!
//! Pull-based delivery: clients poll the unread count and re-fetch the
//! list. All routes require authentication.
//!
//! - GET /api/v1/notifications - Paged listing
//! - GET /api/v1/notifications/unread-count - Unread counter
//! - PUT /api/v1/notifications/{id}/read - Mark one read
//! - PUT /api/v1/notifications/read-all - Mark everything read

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::Notification;

/// Paged notification listing
#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// A single notification
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub kind: String,
    pub actor_id: Option<i64>,
    pub diary_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind.to_string(),
            actor_id: n.actor_id,
            diary_id: n.diary_id,
            comment_id: n.comment_id,
            read: n.read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Unread counter, polled by clients
#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// Build the notification router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/{id}/read", put(mark_read))
        .route("/read-all", put(mark_all_read))
}

/// GET /api/v1/notifications - The caller's notifications, newest first
async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let page = state
        .notification_service
        .list(user.id, query.params())
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(NotificationListResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        notifications: page.items.into_iter().map(NotificationResponse::from).collect(),
    }))
}

/// GET /api/v1/notifications/unread-count
async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state
        .notification_service
        .unread_count(user.id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(UnreadCountResponse { unread }))
}

/// PUT /api/v1/notifications/{id}/read - Mark one notification read
async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let changed = state
        .notification_service
        .mark_read(id, user.id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if !changed {
        return Err(ApiError::not_found("Notification not found"));
    }

    let unread = state
        .notification_service
        .unread_count(user.id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(UnreadCountResponse { unread }))
}

/// PUT /api/v1/notifications/read-all - Mark all notifications read
async fn mark_all_read(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    state
        .notification_service
        .mark_all_read(user.id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(UnreadCountResponse { unread: 0 }))
}
