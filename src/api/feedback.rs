//! Feedback API endpoints (user side)
//!
//! - POST /api/v1/feedback - Submit a ticket
//! - GET /api/v1/feedback/mine - Own tickets
//!
//! Admin triage lives under /api/v1/admin/feedback in the admin module.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::Feedback;

/// Request body for submitting feedback
#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub subject: String,
    pub content: String,
}

/// Paged feedback listing
#[derive(Debug, Serialize)]
pub struct FeedbackListResponse {
    pub feedback: Vec<FeedbackResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// A single feedback ticket
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: i64,
    pub user_id: i64,
    pub subject: String,
    pub content: String,
    pub status: String,
    pub reply: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Feedback> for FeedbackResponse {
    fn from(f: Feedback) -> Self {
        Self {
            id: f.id,
            user_id: f.user_id,
            subject: f.subject,
            content: f.content,
            status: f.status.to_string(),
            reply: f.reply,
            created_at: f.created_at.to_rfc3339(),
            updated_at: f.updated_at.to_rfc3339(),
        }
    }
}

/// Build the feedback router (all routes require auth)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_feedback))
        .route("/mine", get(my_feedback))
}

/// POST /api/v1/feedback - Submit a ticket
async fn submit_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<SubmitFeedbackRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let ticket = state
        .feedback_service
        .submit(user.id, &body.subject, &body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(ticket))))
}

/// GET /api/v1/feedback/mine - The caller's tickets
async fn my_feedback(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<FeedbackListResponse>, ApiError> {
    let page = state.feedback_service.mine(user.id, query.params()).await?;

    Ok(Json(FeedbackListResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        feedback: page.items.into_iter().map(FeedbackResponse::from).collect(),
    }))
}
