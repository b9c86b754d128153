//! Announcement API endpoints (public side)
//!
//! - GET /api/v1/announcements - Published announcements
//!
//! Admin CRUD lives under /api/v1/admin/announcements in the admin module.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::models::Announcement;

/// Paged announcement listing
#[derive(Debug, Serialize)]
pub struct AnnouncementListResponse {
    pub announcements: Vec<AnnouncementResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// A single announcement
#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Announcement> for AnnouncementResponse {
    fn from(a: Announcement) -> Self {
        Self {
            id: a.id,
            title: a.title,
            content: a.content,
            created_at: a.created_at.to_rfc3339(),
            updated_at: a.updated_at.to_rfc3339(),
        }
    }
}

/// Build the public announcement router
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_announcements))
}

/// GET /api/v1/announcements - Published announcements, newest first
async fn list_announcements(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<AnnouncementListResponse>, ApiError> {
    let page = state
        .announcement_service
        .list_published(query.params())
        .await?;

    Ok(Json(AnnouncementListResponse {
        total: page.total,
        page: page.page,
        page_size: page.per_page,
        announcements: page.items.into_iter().map(AnnouncementResponse::from).collect(),
    }))
}
