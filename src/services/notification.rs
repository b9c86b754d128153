//! Notification service
//!
//! Thin coordination layer over the notification repository. Delivery is
//! pull-based: clients poll the unread count and re-fetch the list.

use crate::db::repositories::NotificationRepository;
use crate::models::{ListParams, Notification, PagedResult};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Notification service
pub struct NotificationService {
    notification_repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    /// Create a new notification service
    pub fn new(notification_repo: Arc<dyn NotificationRepository>) -> Self {
        Self { notification_repo }
    }

    /// A user's notifications, newest first
    pub async fn list(
        &self,
        user_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<Notification>> {
        let (items, total) = self
            .notification_repo
            .list_for_user(user_id, &params)
            .await
            .context("Failed to list notifications")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Unread notification count, polled by clients
    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        self.notification_repo
            .unread_count(user_id)
            .await
            .context("Failed to count unread notifications")
    }

    /// Mark one notification read; returns false when it isn't the user's
    /// or was already read
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        self.notification_repo
            .mark_read(id, user_id)
            .await
            .context("Failed to mark notification read")
    }

    /// Mark all of a user's notifications read, returning how many changed
    pub async fn mark_all_read(&self, user_id: i64) -> Result<i64> {
        self.notification_repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxNotificationRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{NotificationKind, User, UserRole};

    async fn setup() -> (NotificationService, Arc<dyn NotificationRepository>, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "notified".to_string(),
                "notified@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        let repo = SqlxNotificationRepository::boxed(pool);
        (NotificationService::new(repo.clone()), repo, user.id)
    }

    #[tokio::test]
    async fn test_unread_count_decrements_per_mark_read() {
        let (service, repo, user) = setup().await;

        let first = repo
            .create(&Notification::new(user, None, NotificationKind::Announcement))
            .await
            .unwrap();
        repo.create(&Notification::new(user, None, NotificationKind::Announcement))
            .await
            .unwrap();

        assert_eq!(service.unread_count(user).await.unwrap(), 2);

        assert!(service.mark_read(first.id, user).await.unwrap());
        assert_eq!(service.unread_count(user).await.unwrap(), 1);

        assert_eq!(service.mark_all_read(user).await.unwrap(), 1);
        assert_eq!(service.unread_count(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let (service, repo, user) = setup().await;

        for _ in 0..15 {
            repo.create(&Notification::new(user, None, NotificationKind::Announcement))
                .await
                .unwrap();
        }

        let page = service
            .list(user, ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.total, 15);
        assert!(page.has_next());
    }
}
