//! Tag service
//!
//! Business logic for keyword tags: slug generation, upsert-by-name,
//! diary/tag linking, and the cached usage-count listing.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Cache key for the tag count listing
const TAG_COUNTS_CACHE_KEY: &str = "tags:counts";

/// Cache TTL for tag listings
const TAG_CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum number of tags on a single diary
const MAX_TAGS_PER_DIARY: usize = 10;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tag not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Generate a URL-friendly slug from a tag name.
///
/// Lowercases, maps whitespace runs to single dashes, and drops anything
/// that isn't alphanumeric or a dash. Non-ASCII alphanumerics are kept so
/// tags in any script survive.
pub fn generate_tag_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true; // Suppress leading dashes

    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Tag service
pub struct TagService {
    tag_repo: Arc<dyn TagRepository>,
    cache: Arc<Cache>,
}

impl TagService {
    /// Create a new tag service
    pub fn new(tag_repo: Arc<dyn TagRepository>, cache: Arc<Cache>) -> Self {
        Self { tag_repo, cache }
    }

    /// Find a tag by name, creating it if it doesn't exist
    pub async fn get_or_create(&self, name: &str) -> Result<Tag, TagServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TagServiceError::ValidationError(
                "Tag name must not be empty".to_string(),
            ));
        }
        if name.len() > 100 {
            return Err(TagServiceError::ValidationError(
                "Tag name must be at most 100 characters".to_string(),
            ));
        }

        if let Some(existing) = self
            .tag_repo
            .get_by_name(name)
            .await
            .context("Failed to look up tag")?
        {
            return Ok(existing);
        }

        let slug = generate_tag_slug(name);
        if slug.is_empty() {
            return Err(TagServiceError::ValidationError(format!(
                "Tag name '{}' produces an empty slug",
                name
            )));
        }

        // A different name can produce an already-taken slug
        if let Some(existing) = self
            .tag_repo
            .get_by_slug(&slug)
            .await
            .context("Failed to look up tag slug")?
        {
            return Ok(existing);
        }

        let tag = Tag {
            id: 0,
            slug,
            name: name.to_string(),
            created_at: Utc::now(),
        };

        let created = self
            .tag_repo
            .create(&tag)
            .await
            .context("Failed to create tag")?;

        self.invalidate_cache().await;
        Ok(created)
    }

    /// Replace the tag set on a diary with the given names
    pub async fn set_for_diary(
        &self,
        diary_id: i64,
        names: &[String],
    ) -> Result<Vec<Tag>, TagServiceError> {
        if names.len() > MAX_TAGS_PER_DIARY {
            return Err(TagServiceError::ValidationError(format!(
                "At most {} tags per diary",
                MAX_TAGS_PER_DIARY
            )));
        }

        self.tag_repo
            .clear_for_diary(diary_id)
            .await
            .context("Failed to clear diary tags")?;

        let mut tags = Vec::new();
        for name in names {
            if name.trim().is_empty() {
                continue;
            }
            let tag = self.get_or_create(name).await?;
            self.tag_repo
                .add_to_diary(tag.id, diary_id)
                .await
                .context("Failed to link tag")?;
            tags.push(tag);
        }

        self.invalidate_cache().await;
        Ok(tags)
    }

    /// Get a tag by slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<Tag, TagServiceError> {
        self.tag_repo
            .get_by_slug(slug)
            .await
            .context("Failed to look up tag")?
            .ok_or_else(|| TagServiceError::NotFound(slug.to_string()))
    }

    /// Tags attached to a diary
    pub async fn tags_for_diary(&self, diary_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        Ok(self
            .tag_repo
            .get_by_diary_id(diary_id)
            .await
            .context("Failed to get diary tags")?)
    }

    /// Tags with public usage counts, cached
    pub async fn list_with_counts(&self, limit: i64) -> Result<Vec<TagWithCount>, TagServiceError> {
        let cache_key = format!("{}:{}", TAG_COUNTS_CACHE_KEY, limit);

        if let Ok(Some(cached)) = self.cache.get::<Vec<TagWithCount>>(&cache_key).await {
            return Ok(cached);
        }

        let counts = self
            .tag_repo
            .list_with_counts(limit)
            .await
            .context("Failed to list tag counts")?;

        if let Err(e) = self.cache.set(&cache_key, &counts, TAG_CACHE_TTL).await {
            tracing::warn!("Failed to cache tag counts: {}", e);
        }

        Ok(counts)
    }

    /// Drop cached tag listings (after diary or tag mutation)
    pub async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_pattern("tags:*").await {
            tracing::warn!("Failed to invalidate tag cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        DiaryRepository, SqlxDiaryRepository, SqlxTagRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Diary, DiaryStatus, DiaryVisibility, User, UserRole};

    async fn setup() -> (TagService, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = create_cache(&CacheConfig::default())
            .await
            .expect("Failed to create cache");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "tagger".to_string(),
                "tagger@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();
        let diary = SqlxDiaryRepository::new(pool.clone())
            .create(&Diary::new(
                user.id,
                "taggable".to_string(),
                "text".to_string(),
                DiaryVisibility::Public,
                DiaryStatus::Published,
            ))
            .await
            .unwrap();

        (TagService::new(SqlxTagRepository::boxed(pool), cache), diary.id)
    }

    #[test]
    fn test_generate_tag_slug() {
        assert_eq!(generate_tag_slug("Rainy Days"), "rainy-days");
        assert_eq!(generate_tag_slug("  spaced  out  "), "spaced-out");
        assert_eq!(generate_tag_slug("Caffeine!!!"), "caffeine");
        assert_eq!(generate_tag_slug("a--b"), "a-b");
        assert_eq!(generate_tag_slug("日記"), "日記");
        assert_eq!(generate_tag_slug("!!!"), "");
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (service, _diary) = setup().await;

        let first = service.get_or_create("morning pages").await.unwrap();
        let second = service.get_or_create("morning pages").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.slug, "morning-pages");
    }

    #[tokio::test]
    async fn test_get_or_create_rejects_empty() {
        let (service, _diary) = setup().await;

        assert!(matches!(
            service.get_or_create("   ").await,
            Err(TagServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.get_or_create("!!!").await,
            Err(TagServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_set_for_diary_replaces_tags() {
        let (service, diary) = setup().await;

        let tags = service
            .set_for_diary(diary, &["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(tags.len(), 2);

        let tags = service.set_for_diary(diary, &["three".to_string()]).await.unwrap();
        assert_eq!(tags.len(), 1);

        let current = service.tags_for_diary(diary).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "three");
    }

    #[tokio::test]
    async fn test_set_for_diary_skips_blank_names() {
        let (service, diary) = setup().await;

        let tags = service
            .set_for_diary(diary, &["real".to_string(), "  ".to_string()])
            .await
            .unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn test_set_for_diary_enforces_limit() {
        let (service, diary) = setup().await;

        let names: Vec<String> = (0..11).map(|i| format!("tag{}", i)).collect();
        assert!(matches!(
            service.set_for_diary(diary, &names).await,
            Err(TagServiceError::ValidationError(_))
        ));
    }
}
