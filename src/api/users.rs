//! User profile and follow API endpoints
//!
//! Handles HTTP requests for public profiles and the follow graph:
//! - GET /api/v1/users/{id} - Public profile with counts and relationship
//! - POST /api/v1/users/{id}/follow - Follow a user
//! - DELETE /api/v1/users/{id}/follow - Unfollow a user
//! - GET /api/v1/users/{id}/followers - Follower listing
//! - GET /api/v1/users/{id}/following - Following listing

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PaginatedUsersResponse;
use crate::services::follow::Relationship;

/// Public profile response
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub followers: i64,
    pub following: i64,
    /// Relationship to the viewer, absent for anonymous requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<Relationship>,
}

/// Response for follow/unfollow operations
#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub following: bool,
    pub followers: i64,
}

/// Build public user routes (optional authentication applied by the caller)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_profile))
        .route("/{id}/followers", get(list_followers))
        .route("/{id}/following", get(list_following))
}

/// Build routes that require authentication
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/follow", post(follow_user))
        .route("/{id}/follow", delete(unfollow_user))
}

/// GET /api/v1/users/{id} - Public profile
async fn get_profile(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .user_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let stats = state.follow_service.stats(id).await?;

    let relationship = match viewer {
        Some(AuthenticatedUser(viewer)) if viewer.id != id => {
            Some(state.follow_service.relationship(viewer.id, id).await?)
        }
        _ => None,
    };

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        display_name: user.display_name,
        avatar: user.avatar,
        bio: user.bio,
        created_at: user.created_at.to_rfc3339(),
        followers: stats.followers,
        following: stats.following,
        relationship,
    }))
}

/// POST /api/v1/users/{id}/follow - Follow a user
async fn follow_user(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<FollowResponse>, ApiError> {
    state.follow_service.follow(&user, id).await?;
    let stats = state.follow_service.stats(id).await?;

    Ok(Json(FollowResponse {
        following: true,
        followers: stats.followers,
    }))
}

/// DELETE /api/v1/users/{id}/follow - Unfollow a user
async fn unfollow_user(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<FollowResponse>, ApiError> {
    state.follow_service.unfollow(&user, id).await?;
    let stats = state.follow_service.stats(id).await?;

    Ok(Json(FollowResponse {
        following: false,
        followers: stats.followers,
    }))
}

/// GET /api/v1/users/{id}/followers - Users following this user
async fn list_followers(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedUsersResponse>, ApiError> {
    ensure_user_exists(&state, id).await?;
    let page = state.follow_service.followers(id, query.params()).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/users/{id}/following - Users this user follows
async fn list_following(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedUsersResponse>, ApiError> {
    ensure_user_exists(&state, id).await?;
    let page = state.follow_service.following(id, query.params()).await?;
    Ok(Json(page.into()))
}

async fn ensure_user_exists(state: &AppState, id: i64) -> Result<(), ApiError> {
    state
        .user_service
        .get_by_id(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("User not found"))
}
