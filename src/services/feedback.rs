//! Feedback service
//!
//! User-submitted feedback tickets and the admin triage flow.

use crate::db::repositories::FeedbackRepository;
use crate::models::{Feedback, FeedbackStatus, ListParams, PagedResult};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Error types for feedback service operations
#[derive(Debug, thiserror::Error)]
pub enum FeedbackServiceError {
    #[error("Feedback not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Feedback service
pub struct FeedbackService {
    feedback_repo: Arc<dyn FeedbackRepository>,
}

impl FeedbackService {
    /// Create a new feedback service
    pub fn new(feedback_repo: Arc<dyn FeedbackRepository>) -> Self {
        Self { feedback_repo }
    }

    /// Submit a new ticket
    pub async fn submit(
        &self,
        user_id: i64,
        subject: &str,
        content: &str,
    ) -> Result<Feedback, FeedbackServiceError> {
        let subject = subject.trim();
        let content = content.trim();

        if subject.is_empty() {
            return Err(FeedbackServiceError::ValidationError(
                "Subject must not be empty".to_string(),
            ));
        }
        if subject.len() > 200 {
            return Err(FeedbackServiceError::ValidationError(
                "Subject must be at most 200 characters".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(FeedbackServiceError::ValidationError(
                "Content must not be empty".to_string(),
            ));
        }

        let ticket = Feedback {
            id: 0,
            user_id,
            subject: subject.to_string(),
            content: content.to_string(),
            status: FeedbackStatus::Open,
            reply: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        Ok(self
            .feedback_repo
            .create(&ticket)
            .await
            .context("Failed to create feedback")?)
    }

    /// The user's own tickets
    pub async fn mine(
        &self,
        user_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<Feedback>, FeedbackServiceError> {
        let (items, total) = self
            .feedback_repo
            .list_by_user(user_id, &params)
            .await
            .context("Failed to list feedback")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// All tickets, optionally filtered by status (admin)
    pub async fn list_all(
        &self,
        status: Option<FeedbackStatus>,
        params: ListParams,
    ) -> Result<PagedResult<Feedback>, FeedbackServiceError> {
        let (items, total) = self
            .feedback_repo
            .list_all(status, &params)
            .await
            .context("Failed to list feedback")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Update a ticket's status and reply (admin)
    pub async fn resolve(
        &self,
        id: i64,
        status: FeedbackStatus,
        reply: Option<&str>,
    ) -> Result<Feedback, FeedbackServiceError> {
        let updated = self
            .feedback_repo
            .resolve(id, status, reply)
            .await
            .context("Failed to resolve feedback")?;
        if !updated {
            return Err(FeedbackServiceError::NotFound);
        }

        self.feedback_repo
            .get_by_id(id)
            .await
            .context("Failed to load feedback")?
            .ok_or(FeedbackServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxFeedbackRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (FeedbackService, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                "reporter".to_string(),
                "reporter@example.com".to_string(),
                "hash".to_string(),
                UserRole::Member,
            ))
            .await
            .unwrap();

        (FeedbackService::new(SqlxFeedbackRepository::boxed(pool)), user.id)
    }

    #[tokio::test]
    async fn test_submit_and_resolve() {
        let (service, user) = setup().await;

        let ticket = service
            .submit(user, "  padded subject  ", "something broke")
            .await
            .unwrap();
        assert_eq!(ticket.subject, "padded subject");
        assert_eq!(ticket.status, FeedbackStatus::Open);

        let resolved = service
            .resolve(ticket.id, FeedbackStatus::Resolved, Some("fixed"))
            .await
            .unwrap();
        assert_eq!(resolved.status, FeedbackStatus::Resolved);
        assert_eq!(resolved.reply.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, user) = setup().await;

        assert!(matches!(
            service.submit(user, "", "content").await,
            Err(FeedbackServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.submit(user, "subject", "  ").await,
            Err(FeedbackServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_status_filtered_listing() {
        let (service, user) = setup().await;

        let first = service.submit(user, "a", "x").await.unwrap();
        service.submit(user, "b", "y").await.unwrap();
        service
            .resolve(first.id, FeedbackStatus::Closed, None)
            .await
            .unwrap();

        let open = service
            .list_all(Some(FeedbackStatus::Open), ListParams::default())
            .await
            .unwrap();
        assert_eq!(open.total, 1);

        let mine = service.mine(user, ListParams::default()).await.unwrap();
        assert_eq!(mine.total, 2);
    }
}
