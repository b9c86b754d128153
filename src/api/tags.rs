//! Tag API endpoints
//!
//! Handles HTTP requests for keyword tags:
//! - GET /api/v1/tags - Tag list with public usage counts
//! - GET /api/v1/tags/{slug}/diaries - Public diaries carrying the tag

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_page_size};
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::PaginatedDiariesResponse;
use crate::models::ListParams;

/// Query parameters for the tag list
#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    #[serde(default = "default_tag_limit")]
    pub limit: i64,
}

fn default_tag_limit() -> i64 {
    50
}

/// Query parameters for the per-tag diary listing
#[derive(Debug, Deserialize)]
pub struct TagDiariesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Response for the tag list
#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagCountResponse>,
}

/// A tag with its public diary count
#[derive(Debug, Serialize)]
pub struct TagCountResponse {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub diary_count: i64,
}

/// Build the tag router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{slug}/diaries", get(get_tag_diaries))
}

/// GET /api/v1/tags - Tags ordered by public usage
async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTagsQuery>,
) -> Result<Json<TagListResponse>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let tags = state.tag_service.list_with_counts(limit).await?;

    Ok(Json(TagListResponse {
        tags: tags
            .into_iter()
            .map(|t| TagCountResponse {
                id: t.id,
                slug: t.slug,
                name: t.name,
                diary_count: t.diary_count,
            })
            .collect(),
    }))
}

/// GET /api/v1/tags/{slug}/diaries - Public diaries for a tag
async fn get_tag_diaries(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<TagDiariesQuery>,
) -> Result<Json<PaginatedDiariesResponse>, ApiError> {
    let page = state
        .diary_service
        .explore(
            None,
            Some(&slug),
            ListParams::new(query.page, query.page_size),
        )
        .await?;

    Ok(Json(page.into()))
}
