//! Diary service
//!
//! Business logic for diary entries:
//! - CRUD with ownership checks
//! - Visibility and status enforcement (private entries and drafts never
//!   leave the author's own views)
//! - Explore and follow-feed listings
//! - View counting and cache invalidation

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{CommentRepository, DiaryRepository, MediaRepository};
use crate::models::{
    CreateDiaryInput, Diary, DiaryStatus, DiaryVisibility, ListParams, Media, PagedResult, Tag,
    UpdateDiaryInput, User,
};
use crate::services::tag::{TagService, TagServiceError};
use anyhow::Context;
use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;

/// Cache key for the first page of the unfiltered explore feed
const EXPLORE_CACHE_KEY: &str = "explore:first";

/// Cache TTL for the explore feed
const EXPLORE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Maximum title length
const MAX_TITLE_LEN: usize = 200;

/// Maximum content length
const MAX_CONTENT_LEN: usize = 50_000;

/// Maximum emotion/weather label length
const MAX_LABEL_LEN: usize = 32;

/// Error types for diary service operations
#[derive(Debug, thiserror::Error)]
pub enum DiaryServiceError {
    #[error("Diary not found")]
    NotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<TagServiceError> for DiaryServiceError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::ValidationError(msg) => DiaryServiceError::ValidationError(msg),
            TagServiceError::NotFound(slug) => {
                DiaryServiceError::ValidationError(format!("Unknown tag: {}", slug))
            }
            TagServiceError::InternalError(e) => DiaryServiceError::InternalError(e),
        }
    }
}

/// A diary together with its tags and media, for detail responses
#[derive(Debug, Clone)]
pub struct DiaryDetail {
    pub diary: Diary,
    pub tags: Vec<Tag>,
    pub media: Vec<Media>,
}

/// Diary service
pub struct DiaryService {
    diary_repo: Arc<dyn DiaryRepository>,
    comment_repo: Arc<dyn CommentRepository>,
    media_repo: Arc<dyn MediaRepository>,
    tag_service: Arc<TagService>,
    cache: Arc<Cache>,
}

impl DiaryService {
    /// Create a new diary service
    pub fn new(
        diary_repo: Arc<dyn DiaryRepository>,
        comment_repo: Arc<dyn CommentRepository>,
        media_repo: Arc<dyn MediaRepository>,
        tag_service: Arc<TagService>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            diary_repo,
            comment_repo,
            media_repo,
            tag_service,
            cache,
        }
    }

    /// Create a new diary entry for the given author
    pub async fn create(
        &self,
        author_id: i64,
        input: CreateDiaryInput,
    ) -> Result<DiaryDetail, DiaryServiceError> {
        validate_text(&input.title, &input.content)?;
        validate_labels(input.emotion.as_deref(), input.weather.as_deref())?;

        let visibility = input.visibility.unwrap_or_default();
        let status = input.status.unwrap_or_default();

        let mut diary = Diary::new(author_id, input.title, input.content, visibility, status);
        diary.emotion = normalize_label(input.emotion);
        diary.weather = normalize_label(input.weather);

        let created = self
            .diary_repo
            .create(&diary)
            .await
            .context("Failed to create diary")?;

        let tags = self.tag_service.set_for_diary(created.id, &input.tags).await?;

        self.invalidate_listings().await;

        Ok(DiaryDetail {
            diary: created,
            tags,
            media: Vec::new(),
        })
    }

    /// Update an existing diary. Only the author or an admin may update.
    pub async fn update(
        &self,
        id: i64,
        user: &User,
        input: UpdateDiaryInput,
    ) -> Result<DiaryDetail, DiaryServiceError> {
        let mut diary = self
            .diary_repo
            .get_by_id(id)
            .await
            .context("Failed to load diary")?
            .ok_or(DiaryServiceError::NotFound)?;

        if !user.can_modify(diary.author_id) {
            return Err(DiaryServiceError::Forbidden);
        }

        if !input.has_changes() {
            let tags = self.tag_service.tags_for_diary(id).await?;
            let media = self
                .media_repo
                .list_by_diary(id)
                .await
                .context("Failed to load media")?;
            return Ok(DiaryDetail { diary, tags, media });
        }

        if let Some(title) = input.title {
            diary.title = title;
        }
        if let Some(content) = input.content {
            diary.content = content;
        }
        validate_text(&diary.title, &diary.content)?;

        if let Some(emotion) = input.emotion {
            diary.emotion = normalize_label(Some(emotion));
        }
        if let Some(weather) = input.weather {
            diary.weather = normalize_label(Some(weather));
        }
        validate_labels(diary.emotion.as_deref(), diary.weather.as_deref())?;

        if let Some(visibility) = input.visibility {
            diary.visibility = visibility;
        }
        if let Some(status) = input.status {
            // First publication stamps published_at; unpublishing clears it
            if status == DiaryStatus::Published && diary.published_at.is_none() {
                diary.published_at = Some(Utc::now());
            } else if status == DiaryStatus::Draft {
                diary.published_at = None;
            }
            diary.status = status;
        }

        let updated = self
            .diary_repo
            .update(&diary)
            .await
            .context("Failed to update diary")?;

        let tags = if let Some(names) = input.tags {
            self.tag_service.set_for_diary(id, &names).await?
        } else {
            self.tag_service.tags_for_diary(id).await?
        };

        let media = self
            .media_repo
            .list_by_diary(id)
            .await
            .context("Failed to load media")?;

        self.invalidate_listings().await;

        Ok(DiaryDetail {
            diary: updated,
            tags,
            media,
        })
    }

    /// Delete a diary. Only the author or an admin may delete. Removes the
    /// entry's likes explicitly; comments and tag links cascade.
    pub async fn delete(&self, id: i64, user: &User) -> Result<(), DiaryServiceError> {
        let diary = self
            .diary_repo
            .get_by_id(id)
            .await
            .context("Failed to load diary")?
            .ok_or(DiaryServiceError::NotFound)?;

        if !user.can_modify(diary.author_id) {
            return Err(DiaryServiceError::Forbidden);
        }

        self.comment_repo
            .delete_likes_for_diary(id)
            .await
            .context("Failed to remove likes")?;

        let deleted = self
            .diary_repo
            .delete(id)
            .await
            .context("Failed to delete diary")?;
        if !deleted {
            return Err(DiaryServiceError::NotFound);
        }

        self.invalidate_listings().await;
        self.tag_service.invalidate_cache().await;

        Ok(())
    }

    /// Fetch a single diary, enforcing visibility.
    ///
    /// Non-authors only ever see public published entries; for them the
    /// view counter is bumped (best-effort). Admins can see everything.
    pub async fn get(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<DiaryDetail, DiaryServiceError> {
        let diary = self
            .diary_repo
            .get_by_id(id)
            .await
            .context("Failed to load diary")?
            .ok_or(DiaryServiceError::NotFound)?;

        let is_owner = viewer.map(|u| u.id == diary.author_id).unwrap_or(false);
        let is_admin = viewer.map(|u| u.is_admin()).unwrap_or(false);

        if !diary.is_publicly_visible() && !is_owner && !is_admin {
            // Hidden entries are indistinguishable from missing ones
            return Err(DiaryServiceError::NotFound);
        }

        let mut diary = diary;
        if diary.is_publicly_visible() && !is_owner {
            if let Err(e) = self.diary_repo.increment_view(id).await {
                tracing::warn!("Failed to bump view count for diary {}: {}", id, e);
            } else {
                diary.view_count += 1;
            }
        }

        let tags = self.tag_service.tags_for_diary(id).await?;
        let media = self
            .media_repo
            .list_by_diary(id)
            .await
            .context("Failed to load media")?;

        Ok(DiaryDetail { diary, tags, media })
    }

    /// The author's own entries, any visibility/status
    pub async fn list_own(
        &self,
        author_id: i64,
        status: Option<DiaryStatus>,
        visibility: Option<DiaryVisibility>,
        params: ListParams,
    ) -> Result<PagedResult<(Diary, Vec<Tag>)>, DiaryServiceError> {
        let (diaries, total) = self
            .diary_repo
            .list_by_author(author_id, status, visibility, &params)
            .await
            .context("Failed to list diaries")?;

        let items = self.with_tags(diaries).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Public explore listing, optionally filtered by emotion or tag slug.
    ///
    /// The unfiltered first page is cached briefly since it is the hottest
    /// read in the system.
    pub async fn explore(
        &self,
        emotion: Option<&str>,
        tag_slug: Option<&str>,
        params: ListParams,
    ) -> Result<PagedResult<(Diary, Vec<Tag>)>, DiaryServiceError> {
        if let Some(slug) = tag_slug {
            let tag = self.tag_service.get_by_slug(slug).await.map_err(|e| match e {
                TagServiceError::NotFound(_) => DiaryServiceError::NotFound,
                other => other.into(),
            })?;
            let (diaries, total) = self
                .diary_repo
                .list_public_by_tag(tag.id, &params)
                .await
                .context("Failed to list diaries by tag")?;
            let items = self.with_tags(diaries).await?;
            return Ok(PagedResult::new(items, total, &params));
        }

        let cacheable = emotion.is_none() && params.page == 1 && params.per_page == 10;
        if cacheable {
            if let Ok(Some(cached)) = self
                .cache
                .get::<PagedResult<(Diary, Vec<Tag>)>>(EXPLORE_CACHE_KEY)
                .await
            {
                return Ok(cached);
            }
        }

        let (diaries, total) = self
            .diary_repo
            .list_public(emotion, &params)
            .await
            .context("Failed to list public diaries")?;
        let items = self.with_tags(diaries).await?;
        let result = PagedResult::new(items, total, &params);

        if cacheable {
            if let Err(e) = self.cache.set(EXPLORE_CACHE_KEY, &result, EXPLORE_CACHE_TTL).await {
                tracing::warn!("Failed to cache explore feed: {}", e);
            }
        }

        Ok(result)
    }

    /// Public published entries from users the viewer follows
    pub async fn feed(
        &self,
        user_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<(Diary, Vec<Tag>)>, DiaryServiceError> {
        let (diaries, total) = self
            .diary_repo
            .list_feed(user_id, &params)
            .await
            .context("Failed to list feed")?;

        let items = self.with_tags(diaries).await?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Public published entries with the highest like counts
    pub async fn top_liked(&self, limit: i64) -> Result<Vec<Diary>, DiaryServiceError> {
        Ok(self
            .diary_repo
            .top_by_likes(limit)
            .await
            .context("Failed to fetch top diaries")?)
    }

    /// Attach tag lists to a page of diaries, fetching concurrently
    async fn with_tags(
        &self,
        diaries: Vec<Diary>,
    ) -> Result<Vec<(Diary, Vec<Tag>)>, DiaryServiceError> {
        let tag_futures = diaries
            .iter()
            .map(|diary| self.tag_service.tags_for_diary(diary.id));
        let tags = try_join_all(tag_futures).await?;
        Ok(diaries.into_iter().zip(tags).collect())
    }

    async fn invalidate_listings(&self) {
        if let Err(e) = self.cache.delete_pattern("explore:*").await {
            tracing::warn!("Failed to invalidate explore cache: {}", e);
        }
    }
}

fn validate_text(title: &str, content: &str) -> Result<(), DiaryServiceError> {
    if title.trim().is_empty() {
        return Err(DiaryServiceError::ValidationError(
            "Title must not be empty".to_string(),
        ));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(DiaryServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    if content.trim().is_empty() {
        return Err(DiaryServiceError::ValidationError(
            "Content must not be empty".to_string(),
        ));
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(DiaryServiceError::ValidationError(format!(
            "Content must be at most {} characters",
            MAX_CONTENT_LEN
        )));
    }
    Ok(())
}

fn validate_labels(
    emotion: Option<&str>,
    weather: Option<&str>,
) -> Result<(), DiaryServiceError> {
    for (label, value) in [("Emotion", emotion), ("Weather", weather)] {
        if let Some(value) = value {
            if value.len() > MAX_LABEL_LEN {
                return Err(DiaryServiceError::ValidationError(format!(
                    "{} label must be at most {} characters",
                    label, MAX_LABEL_LEN
                )));
            }
        }
    }
    Ok(())
}

fn normalize_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}
