//! Admin API endpoints
//!
//! Handles HTTP requests for administration:
//! - GET /api/v1/admin/dashboard - Totals, Top-5 rankings, runtime stats
//! - GET /api/v1/admin/users - User listing
//! - PUT /api/v1/admin/users/{id}/status - Ban/unban a user
//! - DELETE /api/v1/admin/diaries/{id} - Remove any diary
//! - GET /api/v1/admin/feedback - Feedback queue
//! - PUT /api/v1/admin/feedback/{id} - Triage a ticket
//! - CRUD under /api/v1/admin/announcements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::process;
use std::str::FromStr;
use sysinfo::{Pid, System};

use crate::api::common::AdminPaginationQuery;
use crate::api::feedback::FeedbackResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    CreateAnnouncementInput, FeedbackStatus, UpdateAnnouncementInput, UserStatus,
};

/// Dashboard response: entity totals, Top-5 rankings, runtime stats
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_users: i64,
    pub total_diaries: i64,
    pub total_comments: i64,
    pub total_likes: i64,
    pub total_follows: i64,
    pub top_diaries: Vec<TopDiary>,
    pub top_tags: Vec<TopTag>,
    pub requests: RequestStatsResponse,
    pub process: ProcessStatsResponse,
}

/// Entry in the Top-5 diary ranking
#[derive(Debug, Serialize)]
pub struct TopDiary {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub like_count: i64,
    pub view_count: i64,
}

/// Entry in the Top-5 tag ranking
#[derive(Debug, Serialize)]
pub struct TopTag {
    pub id: i64,
    pub name: String,
    pub diary_count: i64,
}

/// Request counters collected by the stats middleware
#[derive(Debug, Serialize)]
pub struct RequestStatsResponse {
    pub total_requests: u64,
    pub avg_response_time_us: f64,
    pub uptime_seconds: u64,
}

/// Process stats sampled via sysinfo
#[derive(Debug, Serialize)]
pub struct ProcessStatsResponse {
    pub memory_bytes: u64,
    pub cpu_usage_percent: f32,
}

/// Request for changing a user's status
#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    pub status: String,
}

/// Admin user listing entry (includes email and status)
#[derive(Debug, Serialize)]
pub struct AdminUserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub created_at: String,
}

impl From<crate::models::User> for AdminUserResponse {
    fn from(user: crate::models::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            status: user.status.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Paged admin user listing
#[derive(Debug, Serialize)]
pub struct AdminUserListResponse {
    pub users: Vec<AdminUserResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Query parameters for the feedback queue
#[derive(Debug, Deserialize)]
pub struct FeedbackQueueQuery {
    #[serde(default = "crate::api::common::default_page")]
    pub page: u32,
    #[serde(default = "crate::api::common::default_admin_page_size")]
    pub page_size: u32,
    pub status: Option<String>,
}

/// Request for triaging a feedback ticket
#[derive(Debug, Deserialize)]
pub struct FeedbackTriageRequest {
    pub status: String,
    pub reply: Option<String>,
}

/// Paged admin feedback listing
#[derive(Debug, Serialize)]
pub struct AdminFeedbackListResponse {
    pub feedback: Vec<FeedbackResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Paged admin announcement listing (drafts included)
#[derive(Debug, Serialize)]
pub struct AdminAnnouncementListResponse {
    pub announcements: Vec<AdminAnnouncementResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Admin view of an announcement (includes the published flag)
#[derive(Debug, Serialize)]
pub struct AdminAnnouncementResponse {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<crate::models::Announcement> for AdminAnnouncementResponse {
    fn from(a: crate::models::Announcement) -> Self {
        Self {
            id: a.id,
            author_id: a.author_id,
            title: a.title,
            content: a.content,
            published: a.published,
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        }
    }
}

/// Build the admin router (auth + admin middleware applied by the caller)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/{id}/status", put(set_user_status))
        .route("/diaries/{id}", delete(delete_diary))
        .route("/feedback", get(feedback_queue))
        .route("/feedback/{id}", put(triage_feedback))
        .route("/announcements", get(list_announcements))
        .route("/announcements", post(create_announcement))
        .route("/announcements/{id}", put(update_announcement))
        .route("/announcements/{id}", delete(delete_announcement))
}

/// GET /api/v1/admin/dashboard - Aggregate stats
async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let (total_users, total_diaries, total_comments, total_likes, total_follows) = tokio::try_join!(
        state.user_repo.count(),
        state.diary_repo.count(),
        state.comment_repo.count(),
        state.comment_repo.count_likes(),
        state.follow_repo.count(),
    )
    .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let top_diaries = state
        .diary_service
        .top_liked(5)
        .await?
        .into_iter()
        .map(|d| TopDiary {
            id: d.id,
            title: d.title,
            author_id: d.author_id,
            like_count: d.like_count,
            view_count: d.view_count,
        })
        .collect();

    let top_tags = state
        .tag_service
        .list_with_counts(5)
        .await?
        .into_iter()
        .map(|t| TopTag {
            id: t.id,
            name: t.name,
            diary_count: t.diary_count,
        })
        .collect();

    Ok(Json(DashboardResponse {
        total_users,
        total_diaries,
        total_comments,
        total_likes,
        total_follows,
        top_diaries,
        top_tags,
        requests: RequestStatsResponse {
            total_requests: state.request_stats.total_requests(),
            avg_response_time_us: state.request_stats.avg_response_time_us(),
            uptime_seconds: state.request_stats.uptime_seconds(),
        },
        process: process_stats(),
    }))
}

/// Sample current process memory and CPU usage
fn process_stats() -> ProcessStatsResponse {
    let mut system = System::new();
    system.refresh_all();

    let pid = Pid::from_u32(process::id());
    match system.process(pid) {
        Some(proc) => ProcessStatsResponse {
            memory_bytes: proc.memory(),
            cpu_usage_percent: proc.cpu_usage(),
        },
        None => ProcessStatsResponse {
            memory_bytes: 0,
            cpu_usage_percent: 0.0,
        },
    }
}

/// GET /api/v1/admin/users - All users, paged
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<AdminUserListResponse>, ApiError> {
    let params = query.params();
    let (users, total) = state
        .user_repo
        .list(params.page as i64, params.per_page as i64)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(AdminUserListResponse {
        users: users.into_iter().map(AdminUserResponse::from).collect(),
        total,
        page: params.page,
        page_size: params.per_page,
    }))
}

/// PUT /api/v1/admin/users/{id}/status - Ban or unban a user
async fn set_user_status(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UserStatusRequest>,
) -> Result<Json<AdminUserResponse>, ApiError> {
    let status = UserStatus::from_str(&body.status)
        .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", body.status)))?;

    if admin.id == id && status == UserStatus::Banned {
        return Err(ApiError::validation_error("You cannot ban yourself"));
    }

    let mut user = state
        .user_repo
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    user.status = status;
    let updated = state
        .user_repo
        .update(&user)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(updated.into()))
}

/// DELETE /api/v1/admin/diaries/{id} - Remove any diary
async fn delete_diary(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.diary_service.delete(id, &admin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/feedback - Feedback queue, optionally by status
async fn feedback_queue(
    State(state): State<AppState>,
    Query(query): Query<FeedbackQueueQuery>,
) -> Result<Json<AdminFeedbackListResponse>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            FeedbackStatus::from_str(s)
                .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", s)))?,
        ),
    };

    let page = state
        .feedback_service
        .list_all(status, crate::models::ListParams::new(query.page, query.page_size))
        .await?;

    Ok(Json(AdminFeedbackListResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        feedback: page.items.into_iter().map(FeedbackResponse::from).collect(),
    }))
}

/// PUT /api/v1/admin/feedback/{id} - Set status and reply
async fn triage_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<FeedbackTriageRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let status = FeedbackStatus::from_str(&body.status)
        .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", body.status)))?;

    let updated = state
        .feedback_service
        .resolve(id, status, body.reply.as_deref())
        .await?;

    Ok(Json(updated.into()))
}

/// GET /api/v1/admin/announcements - All announcements, drafts included
async fn list_announcements(
    State(state): State<AppState>,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<AdminAnnouncementListResponse>, ApiError> {
    let page = state.announcement_service.list_all(query.params()).await?;

    Ok(Json(AdminAnnouncementListResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        announcements: page
            .items
            .into_iter()
            .map(AdminAnnouncementResponse::from)
            .collect(),
    }))
}

/// POST /api/v1/admin/announcements - Create an announcement
///
/// Creating it published broadcasts a notification to every active user.
async fn create_announcement(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    Json(body): Json<CreateAnnouncementInput>,
) -> Result<(StatusCode, Json<AdminAnnouncementResponse>), ApiError> {
    let created = state.announcement_service.create(admin.id, body).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// PUT /api/v1/admin/announcements/{id} - Update an announcement
async fn update_announcement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAnnouncementInput>,
) -> Result<Json<AdminAnnouncementResponse>, ApiError> {
    let updated = state.announcement_service.update(id, body).await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/v1/admin/announcements/{id} - Delete an announcement
async fn delete_announcement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.announcement_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
