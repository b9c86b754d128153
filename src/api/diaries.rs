//! Diary API endpoints
//!
//! Handles HTTP requests for diary entries:
//! - POST /api/v1/diaries - Create a diary
//! - GET /api/v1/diaries - List own diaries
//! - GET /api/v1/diaries/{id} - Get one diary (visibility enforced)
//! - PUT /api/v1/diaries/{id} - Update a diary
//! - DELETE /api/v1/diaries/{id} - Delete a diary
//! - GET /api/v1/explore - Public explore listing
//! - GET /api/v1/feed - Follow feed

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_page_size};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{DiaryResponse, PaginatedDiariesResponse};
use crate::models::{CreateDiaryInput, DiaryStatus, DiaryVisibility, ListParams, UpdateDiaryInput};

/// Query parameters for the own-diary listing
#[derive(Debug, Deserialize)]
pub struct ListOwnQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub status: Option<String>,
    pub visibility: Option<String>,
}

/// Query parameters for the explore listing
#[derive(Debug, Deserialize)]
pub struct ExploreQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub emotion: Option<String>,
    pub tag: Option<String>,
}

/// Build routes that require authentication
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/diaries", post(create_diary))
        .route("/diaries", get(list_own_diaries))
        .route("/diaries/{id}", put(update_diary))
        .route("/diaries/{id}", delete(delete_diary))
        .route("/feed", get(feed))
}

/// Build public routes (optional authentication applied by the caller)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/diaries/{id}", get(get_diary))
        .route("/explore", get(explore))
}

/// POST /api/v1/diaries - Create a diary entry
async fn create_diary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateDiaryInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state.diary_service.create(user.id, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(DiaryResponse::new(detail.diary, detail.tags, detail.media)),
    ))
}

/// GET /api/v1/diaries - The caller's own diaries, drafts and private
/// entries included
async fn list_own_diaries(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListOwnQuery>,
) -> Result<Json<PaginatedDiariesResponse>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            DiaryStatus::from_str(s)
                .ok_or_else(|| ApiError::validation_error(format!("Invalid status: {}", s)))?,
        ),
    };
    let visibility = match query.visibility.as_deref() {
        None => None,
        Some(v) => Some(
            DiaryVisibility::from_str(v)
                .ok_or_else(|| ApiError::validation_error(format!("Invalid visibility: {}", v)))?,
        ),
    };

    let page = state
        .diary_service
        .list_own(
            user.id,
            status,
            visibility,
            ListParams::new(query.page, query.page_size),
        )
        .await?;

    Ok(Json(page.into()))
}

/// GET /api/v1/diaries/{id} - Diary detail
///
/// Private entries and drafts return NOT_FOUND to everyone but the author
/// (and admins).
async fn get_diary(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<DiaryResponse>, ApiError> {
    let viewer = user.as_ref().map(|u| &u.0);
    let detail = state.diary_service.get(id, viewer).await?;

    Ok(Json(DiaryResponse::new(detail.diary, detail.tags, detail.media)))
}

/// PUT /api/v1/diaries/{id} - Update a diary
async fn update_diary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDiaryInput>,
) -> Result<Json<DiaryResponse>, ApiError> {
    let detail = state.diary_service.update(id, &user, body).await?;

    Ok(Json(DiaryResponse::new(detail.diary, detail.tags, detail.media)))
}

/// DELETE /api/v1/diaries/{id} - Delete a diary with its comments and likes
async fn delete_diary(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.diary_service.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/explore - Public published diaries, filterable by emotion
/// or tag
async fn explore(
    State(state): State<AppState>,
    Query(query): Query<ExploreQuery>,
) -> Result<Json<PaginatedDiariesResponse>, ApiError> {
    let page = state
        .diary_service
        .explore(
            query.emotion.as_deref(),
            query.tag.as_deref(),
            ListParams::new(query.page, query.page_size),
        )
        .await?;

    Ok(Json(page.into()))
}

/// GET /api/v1/feed - Public published diaries from followed users
async fn feed(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<crate::api::common::PaginationQuery>,
) -> Result<Json<PaginatedDiariesResponse>, ApiError> {
    let page = state.diary_service.feed(user.id, query.params()).await?;
    Ok(Json(page.into()))
}
