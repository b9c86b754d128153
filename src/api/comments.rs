//! Comment and like API endpoints
//!
//! Handles HTTP requests for comments and like toggles:
//! - GET /api/v1/diaries/{id}/comments - Threaded comment listing
//! - POST /api/v1/comments - Create a comment
//! - DELETE /api/v1/comments/{id} - Delete a comment
//! - POST /api/v1/likes/toggle - Toggle a like on a diary or comment
//! - GET /api/v1/likes/check - Check whether the caller liked a target

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CommentWithMeta, CreateCommentInput, LikeTargetType};

/// Request body for the like toggle
#[derive(Debug, Deserialize)]
pub struct LikeToggleRequest {
    pub target_type: String,
    pub target_id: i64,
}

/// Query parameters for the like check
#[derive(Debug, Deserialize)]
pub struct LikeCheckQuery {
    pub target_type: String,
    pub target_id: i64,
}

/// Response for the like toggle and check
#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

/// Response for a created comment
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub diary_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: String,
}

impl From<crate::models::Comment> for CommentResponse {
    fn from(comment: crate::models::Comment) -> Self {
        Self {
            id: comment.id,
            diary_id: comment.diary_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            content: comment.content,
            created_at: comment.created_at.to_rfc3339(),
        }
    }
}

/// Build public comment routes (optional authentication applied by the
/// caller; the viewer drives `is_liked` flags)
pub fn public_router() -> Router<AppState> {
    Router::new().route("/diaries/{id}/comments", get(get_comments))
}

/// Build routes that require authentication
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/{id}", delete(delete_comment))
        .route("/likes/toggle", post(toggle_like))
        .route("/likes/check", get(check_like))
}

/// GET /api/v1/diaries/{id}/comments - Threaded comments for a diary
async fn get_comments(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(diary_id): Path<i64>,
) -> Result<Json<Vec<CommentWithMeta>>, ApiError> {
    let viewer = viewer.as_ref().map(|u| &u.0);
    let comments = state
        .comment_service
        .list_for_diary(diary_id, viewer)
        .await?;

    Ok(Json(comments))
}

/// POST /api/v1/comments - Create a comment or reply
async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateCommentInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let comment = state.comment_service.create(&user, body).await?;

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// DELETE /api/v1/comments/{id} - Delete a comment
///
/// Allowed for the comment author, the diary owner, and admins.
async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/likes/toggle - Toggle a like on a diary or comment
async fn toggle_like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<LikeToggleRequest>,
) -> Result<Json<LikeResponse>, ApiError> {
    let target_type = parse_target_type(&body.target_type)?;

    let toggle = state
        .comment_service
        .toggle_like(&user, target_type, body.target_id)
        .await?;

    Ok(Json(LikeResponse {
        liked: toggle.liked,
        count: Some(toggle.count),
    }))
}

/// GET /api/v1/likes/check - Whether the caller has liked the target
async fn check_like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<LikeCheckQuery>,
) -> Result<Json<LikeResponse>, ApiError> {
    let target_type = parse_target_type(&query.target_type)?;

    let liked = state
        .comment_service
        .check_like(user.id, target_type, query.target_id)
        .await?;

    Ok(Json(LikeResponse { liked, count: None }))
}

fn parse_target_type(raw: &str) -> Result<LikeTargetType, ApiError> {
    LikeTargetType::from_str(raw).map_err(ApiError::validation_error)
}
