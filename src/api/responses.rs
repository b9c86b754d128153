//! Shared API response types
//!
//! This module contains common response structures used across multiple API
//! endpoints to ensure consistency and reduce duplication.

use serde::{Deserialize, Serialize};

use crate::models::{Diary, Media, PagedResult, Tag, User};

// ============================================================================
// User Response Types
// ============================================================================

/// Public user summary embedded in other responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar: user.avatar,
        }
    }
}

// ============================================================================
// Diary Response Types
// ============================================================================

/// Full diary response with tags and media
#[derive(Debug, Serialize, Deserialize)]
pub struct DiaryResponse {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    pub visibility: String,
    pub status: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<TagInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub media: Vec<MediaInfo>,
}

/// Tag info embedded in diary responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

impl From<Tag> for TagInfo {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            slug: tag.slug,
            name: tag.name,
        }
    }
}

/// Media info embedded in diary responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: i64,
    pub url: String,
    pub content_type: String,
    pub size: i64,
}

impl From<Media> for MediaInfo {
    fn from(media: Media) -> Self {
        Self {
            id: media.id,
            url: media.url,
            content_type: media.content_type,
            size: media.size,
        }
    }
}

impl DiaryResponse {
    /// Build a response from a diary with its tags and media
    pub fn new(diary: Diary, tags: Vec<Tag>, media: Vec<Media>) -> Self {
        Self {
            id: diary.id,
            author_id: diary.author_id,
            title: diary.title,
            content: diary.content,
            emotion: diary.emotion,
            weather: diary.weather,
            visibility: diary.visibility.to_string(),
            status: diary.status.to_string(),
            view_count: diary.view_count,
            like_count: diary.like_count,
            comment_count: diary.comment_count,
            published_at: diary.published_at.map(|dt| dt.to_rfc3339()),
            created_at: diary.created_at.to_rfc3339(),
            updated_at: diary.updated_at.to_rfc3339(),
            tags: tags.into_iter().map(TagInfo::from).collect(),
            media: media.into_iter().map(MediaInfo::from).collect(),
        }
    }
}

impl From<(Diary, Vec<Tag>)> for DiaryResponse {
    fn from((diary, tags): (Diary, Vec<Tag>)) -> Self {
        Self::new(diary, tags, Vec::new())
    }
}

// ============================================================================
// Pagination Response Types
// ============================================================================

/// Paginated diary list response
#[derive(Debug, Serialize)]
pub struct PaginatedDiariesResponse {
    pub diaries: Vec<DiaryResponse>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl From<PagedResult<(Diary, Vec<Tag>)>> for PaginatedDiariesResponse {
    fn from(page: PagedResult<(Diary, Vec<Tag>)>) -> Self {
        let total = page.total;
        let current = page.page;
        let page_size = page.per_page;
        let total_pages = page.total_pages();
        Self {
            diaries: page.items.into_iter().map(DiaryResponse::from).collect(),
            total,
            page: current,
            page_size,
            total_pages,
        }
    }
}

/// Paginated user list response (followers/following)
#[derive(Debug, Serialize)]
pub struct PaginatedUsersResponse {
    pub users: Vec<UserSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl From<PagedResult<User>> for PaginatedUsersResponse {
    fn from(page: PagedResult<User>) -> Self {
        let total = page.total;
        let current = page.page;
        let page_size = page.per_page;
        let total_pages = page.total_pages();
        Self {
            users: page.items.into_iter().map(UserSummary::from).collect(),
            total,
            page: current,
            page_size,
            total_pages,
        }
    }
}
