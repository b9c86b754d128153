//! Announcement service
//!
//! Admin broadcast messages. Publishing an announcement fans out one
//! notification row per active user.

use crate::db::repositories::{AnnouncementRepository, NotificationRepository};
use crate::models::{
    Announcement, CreateAnnouncementInput, ListParams, PagedResult, UpdateAnnouncementInput,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Error types for announcement service operations
#[derive(Debug, thiserror::Error)]
pub enum AnnouncementServiceError {
    #[error("Announcement not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Announcement service
pub struct AnnouncementService {
    announcement_repo: Arc<dyn AnnouncementRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
}

impl AnnouncementService {
    /// Create a new announcement service
    pub fn new(
        announcement_repo: Arc<dyn AnnouncementRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            announcement_repo,
            notification_repo,
        }
    }

    /// Create an announcement. Creating it already-published broadcasts
    /// immediately.
    pub async fn create(
        &self,
        author_id: i64,
        input: CreateAnnouncementInput,
    ) -> Result<Announcement, AnnouncementServiceError> {
        validate(&input.title, &input.content)?;

        let announcement = Announcement {
            id: 0,
            author_id,
            title: input.title,
            content: input.content,
            published: input.published,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let created = self
            .announcement_repo
            .create(&announcement)
            .await
            .context("Failed to create announcement")?;

        if created.published {
            self.broadcast(author_id).await;
        }

        Ok(created)
    }

    /// Update an announcement. A draft-to-published transition broadcasts.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateAnnouncementInput,
    ) -> Result<Announcement, AnnouncementServiceError> {
        let mut announcement = self
            .announcement_repo
            .get_by_id(id)
            .await
            .context("Failed to load announcement")?
            .ok_or(AnnouncementServiceError::NotFound)?;

        let was_published = announcement.published;

        if let Some(title) = input.title {
            announcement.title = title;
        }
        if let Some(content) = input.content {
            announcement.content = content;
        }
        validate(&announcement.title, &announcement.content)?;

        if let Some(published) = input.published {
            announcement.published = published;
        }

        let updated = self
            .announcement_repo
            .update(&announcement)
            .await
            .context("Failed to update announcement")?;

        if updated.published && !was_published {
            self.broadcast(updated.author_id).await;
        }

        Ok(updated)
    }

    /// Delete an announcement
    pub async fn delete(&self, id: i64) -> Result<(), AnnouncementServiceError> {
        let deleted = self
            .announcement_repo
            .delete(id)
            .await
            .context("Failed to delete announcement")?;
        if !deleted {
            return Err(AnnouncementServiceError::NotFound);
        }
        Ok(())
    }

    /// Get one announcement (admin view, drafts included)
    pub async fn get(&self, id: i64) -> Result<Announcement, AnnouncementServiceError> {
        self.announcement_repo
            .get_by_id(id)
            .await
            .context("Failed to load announcement")?
            .ok_or(AnnouncementServiceError::NotFound)
    }

    /// Published announcements, for all users
    pub async fn list_published(
        &self,
        params: ListParams,
    ) -> Result<PagedResult<Announcement>, AnnouncementServiceError> {
        let (items, total) = self
            .announcement_repo
            .list(true, &params)
            .await
            .context("Failed to list announcements")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// All announcements including drafts, for admins
    pub async fn list_all(
        &self,
        params: ListParams,
    ) -> Result<PagedResult<Announcement>, AnnouncementServiceError> {
        let (items, total) = self
            .announcement_repo
            .list(false, &params)
            .await
            .context("Failed to list announcements")?;
        Ok(PagedResult::new(items, total, &params))
    }

    async fn broadcast(&self, author_id: i64) {
        match self.notification_repo.broadcast_announcement(author_id).await {
            Ok(count) => tracing::info!("Announcement broadcast to {} users", count),
            Err(e) => tracing::warn!("Failed to broadcast announcement: {}", e),
        }
    }
}

fn validate(title: &str, content: &str) -> Result<(), AnnouncementServiceError> {
    if title.trim().is_empty() {
        return Err(AnnouncementServiceError::ValidationError(
            "Title must not be empty".to_string(),
        ));
    }
    if title.len() > 200 {
        return Err(AnnouncementServiceError::ValidationError(
            "Title must be at most 200 characters".to_string(),
        ));
    }
    if content.trim().is_empty() {
        return Err(AnnouncementServiceError::ValidationError(
            "Content must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        NotificationRepository, SqlxAnnouncementRepository, SqlxNotificationRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{User, UserRole};

    async fn setup() -> (DynDatabasePool, AnnouncementService, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let admin = user_repo
            .create(&User::new(
                "admin".to_string(),
                "admin@example.com".to_string(),
                "hash".to_string(),
                UserRole::Admin,
            ))
            .await
            .unwrap();
        let member = user_repo
            .create(&User::new(
                "member".to_string(),
                "member@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        let service = AnnouncementService::new(
            SqlxAnnouncementRepository::boxed(pool.clone()),
            SqlxNotificationRepository::boxed(pool.clone()),
        );

        (pool, service, admin.id, member.id)
    }

    fn create_input(title: &str, published: bool) -> CreateAnnouncementInput {
        CreateAnnouncementInput {
            title: title.to_string(),
            content: "please read".to_string(),
            published,
        }
    }

    #[tokio::test]
    async fn test_publishing_broadcasts_to_all_users() {
        let (pool, service, admin, member) = setup().await;

        service
            .create(admin, create_input("maintenance", true))
            .await
            .unwrap();

        let notification_repo = SqlxNotificationRepository::new(pool.clone());
        // Both the admin and the member receive the broadcast
        assert_eq!(notification_repo.unread_count(admin).await.unwrap(), 1);
        assert_eq!(notification_repo.unread_count(member).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_draft_does_not_broadcast_until_published() {
        let (pool, service, admin, member) = setup().await;

        let draft = service
            .create(admin, create_input("upcoming", false))
            .await
            .unwrap();

        let notification_repo = SqlxNotificationRepository::new(pool.clone());
        assert_eq!(notification_repo.unread_count(member).await.unwrap(), 0);

        service
            .update(
                draft.id,
                UpdateAnnouncementInput {
                    published: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(notification_repo.unread_count(member).await.unwrap(), 1);

        // Editing an already-published announcement does not rebroadcast
        service
            .update(
                draft.id,
                UpdateAnnouncementInput {
                    content: Some("updated text".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(notification_repo.unread_count(member).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_public_listing_hides_drafts() {
        let (_pool, service, admin, _member) = setup().await;

        service.create(admin, create_input("live", true)).await.unwrap();
        service.create(admin, create_input("draft", false)).await.unwrap();

        let published = service.list_published(ListParams::default()).await.unwrap();
        assert_eq!(published.total, 1);
        assert_eq!(published.items[0].title, "live");

        let all = service.list_all(ListParams::default()).await.unwrap();
        assert_eq!(all.total, 2);
    }

    #[tokio::test]
    async fn test_validation() {
        let (_pool, service, admin, _member) = setup().await;

        assert!(matches!(
            service.create(admin, create_input("  ", true)).await,
            Err(AnnouncementServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_returns_not_found() {
        let (_pool, service, _admin, _member) = setup().await;

        assert!(matches!(
            service.delete(424242).await,
            Err(AnnouncementServiceError::NotFound)
        ));
    }
}
