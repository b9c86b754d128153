//! Follow service
//!
//! Business logic for the follow graph: follow/unfollow, relationship
//! queries, and follower/following listings. A new follow notifies the
//! followed user (best-effort).

use crate::db::repositories::{FollowRepository, NotificationRepository, UserRepository};
use crate::models::{
    FollowStats, ListParams, Notification, NotificationKind, PagedResult, User,
};
use anyhow::Context;
use std::sync::Arc;

/// Error types for follow service operations
#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Relationship between a viewer and another user
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct Relationship {
    pub is_following: bool,
    pub is_followed_by: bool,
    pub is_mutual: bool,
}

/// Follow service
pub struct FollowService {
    follow_repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
}

impl FollowService {
    /// Create a new follow service
    pub fn new(
        follow_repo: Arc<dyn FollowRepository>,
        user_repo: Arc<dyn UserRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            follow_repo,
            user_repo,
            notification_repo,
        }
    }

    /// Follow a user. Returns false when the edge already existed.
    pub async fn follow(&self, follower: &User, followed_id: i64) -> Result<bool, FollowServiceError> {
        if follower.id == followed_id {
            return Err(FollowServiceError::ValidationError(
                "You cannot follow yourself".to_string(),
            ));
        }

        self.user_repo
            .get_by_id(followed_id)
            .await
            .context("Failed to load user")?
            .ok_or(FollowServiceError::UserNotFound)?;

        let created = self
            .follow_repo
            .create(follower.id, followed_id)
            .await
            .context("Failed to create follow")?;

        if created {
            let notification =
                Notification::new(followed_id, Some(follower.id), NotificationKind::Follow);
            if let Err(e) = self.notification_repo.create(&notification).await {
                tracing::warn!("Failed to insert follow notification: {}", e);
            }
        }

        Ok(created)
    }

    /// Unfollow a user. Returns false when no edge existed.
    pub async fn unfollow(
        &self,
        follower: &User,
        followed_id: i64,
    ) -> Result<bool, FollowServiceError> {
        Ok(self
            .follow_repo
            .delete(follower.id, followed_id)
            .await
            .context("Failed to delete follow")?)
    }

    /// Follower/following counts for a user
    pub async fn stats(&self, user_id: i64) -> Result<FollowStats, FollowServiceError> {
        Ok(self
            .follow_repo
            .stats(user_id)
            .await
            .context("Failed to get follow stats")?)
    }

    /// The relationship between a viewer and a user. "Mutual" means both
    /// directed edges exist.
    pub async fn relationship(
        &self,
        viewer_id: i64,
        user_id: i64,
    ) -> Result<Relationship, FollowServiceError> {
        if viewer_id == user_id {
            return Ok(Relationship::default());
        }

        let is_following = self
            .follow_repo
            .exists(viewer_id, user_id)
            .await
            .context("Failed to check follow")?;
        let is_followed_by = self
            .follow_repo
            .exists(user_id, viewer_id)
            .await
            .context("Failed to check follow")?;

        Ok(Relationship {
            is_following,
            is_followed_by,
            is_mutual: is_following && is_followed_by,
        })
    }

    /// Users following the given user
    pub async fn followers(
        &self,
        user_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<User>, FollowServiceError> {
        let (users, total) = self
            .follow_repo
            .list_followers(user_id, &params)
            .await
            .context("Failed to list followers")?;
        Ok(PagedResult::new(users, total, &params))
    }

    /// Users the given user follows
    pub async fn following(
        &self,
        user_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<User>, FollowServiceError> {
        let (users, total) = self
            .follow_repo
            .list_following(user_id, &params)
            .await
            .context("Failed to list following")?;
        Ok(PagedResult::new(users, total, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        NotificationRepository, SqlxFollowRepository, SqlxNotificationRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserRole;

    async fn setup() -> (DynDatabasePool, FollowService, User, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let ada = user_repo
            .create(&User::new(
                "ada".to_string(),
                "ada@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();
        let ben = user_repo
            .create(&User::new(
                "ben".to_string(),
                "ben@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        let service = FollowService::new(
            SqlxFollowRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            SqlxNotificationRepository::boxed(pool.clone()),
        );

        (pool, service, ada, ben)
    }

    #[tokio::test]
    async fn test_follow_notifies_followed_user() {
        let (pool, service, ada, ben) = setup().await;

        assert!(service.follow(&ada, ben.id).await.unwrap());

        let notification_repo = SqlxNotificationRepository::new(pool.clone());
        assert_eq!(notification_repo.unread_count(ben.id).await.unwrap(), 1);

        // Re-following is a no-op and doesn't notify again
        assert!(!service.follow(&ada, ben.id).await.unwrap());
        assert_eq!(notification_repo.unread_count(ben.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_self_follow_rejected() {
        let (_pool, service, ada, _ben) = setup().await;

        assert!(matches!(
            service.follow(&ada, ada.id).await,
            Err(FollowServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_unknown_user_rejected() {
        let (_pool, service, ada, _ben) = setup().await;

        assert!(matches!(
            service.follow(&ada, 9999).await,
            Err(FollowServiceError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_relationship_and_mutual() {
        let (_pool, service, ada, ben) = setup().await;

        service.follow(&ada, ben.id).await.unwrap();

        let rel = service.relationship(ada.id, ben.id).await.unwrap();
        assert!(rel.is_following && !rel.is_followed_by && !rel.is_mutual);

        service.follow(&ben, ada.id).await.unwrap();

        let rel = service.relationship(ada.id, ben.id).await.unwrap();
        assert!(rel.is_mutual);
    }

    #[tokio::test]
    async fn test_unfollow_restores_stats() {
        let (_pool, service, ada, ben) = setup().await;

        service.follow(&ada, ben.id).await.unwrap();
        assert_eq!(service.stats(ben.id).await.unwrap().followers, 1);

        assert!(service.unfollow(&ada, ben.id).await.unwrap());
        assert_eq!(service.stats(ben.id).await.unwrap().followers, 0);

        // Unfollowing again is a no-op
        assert!(!service.unfollow(&ada, ben.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_listings() {
        let (_pool, service, ada, ben) = setup().await;

        service.follow(&ada, ben.id).await.unwrap();

        let followers = service
            .followers(ben.id, ListParams::default())
            .await
            .unwrap();
        assert_eq!(followers.total, 1);
        assert_eq!(followers.items[0].username, "ada");

        let following = service
            .following(ada.id, ListParams::default())
            .await
            .unwrap();
        assert_eq!(following.total, 1);
        assert_eq!(following.items[0].username, "ben");
    }
}
