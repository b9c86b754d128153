//! Comment service
//!
//! Business logic for comments and like toggles, including the
//! notification fan-out to diary and comment owners. Notification inserts
//! are best-effort: a failed insert is logged and never fails the main
//! operation.

use crate::db::repositories::{CommentRepository, DiaryRepository, NotificationRepository};
use crate::models::{
    Comment, CommentWithMeta, CreateCommentInput, Diary, LikeTargetType, Notification,
    NotificationKind, User,
};
use anyhow::Context;
use std::sync::Arc;

/// Maximum comment length
const MAX_COMMENT_LEN: usize = 2000;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Not found")]
    NotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy)]
pub struct LikeToggle {
    /// Whether the target is liked after the toggle
    pub liked: bool,
    /// Like count after the toggle
    pub count: i64,
}

/// Comment service
pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    diary_repo: Arc<dyn DiaryRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
}

impl CommentService {
    /// Create a new comment service
    pub fn new(
        comment_repo: Arc<dyn CommentRepository>,
        diary_repo: Arc<dyn DiaryRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            comment_repo,
            diary_repo,
            notification_repo,
        }
    }

    /// Create a comment on a diary the user can see.
    ///
    /// Replies must target a comment on the same diary. The diary author is
    /// notified unless they wrote the comment themselves.
    pub async fn create(
        &self,
        user: &User,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let content = input.content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Comment must not be empty".to_string(),
            ));
        }
        if content.len() > MAX_COMMENT_LEN {
            return Err(CommentServiceError::ValidationError(format!(
                "Comment must be at most {} characters",
                MAX_COMMENT_LEN
            )));
        }

        let diary = self.visible_diary(input.diary_id, user).await?;

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .comment_repo
                .get_by_id(parent_id)
                .await
                .context("Failed to load parent comment")?
                .ok_or(CommentServiceError::NotFound)?;
            if parent.diary_id != diary.id {
                return Err(CommentServiceError::ValidationError(
                    "Reply must target a comment on the same diary".to_string(),
                ));
            }
        }

        let input = CreateCommentInput {
            diary_id: input.diary_id,
            parent_id: input.parent_id,
            content: content.to_string(),
        };

        let comment = self
            .comment_repo
            .create(&input, user.id)
            .await
            .context("Failed to create comment")?;

        self.diary_repo
            .recount_comments(diary.id)
            .await
            .context("Failed to recount comments")?;

        if diary.author_id != user.id {
            self.notify(
                Notification::new(diary.author_id, Some(user.id), NotificationKind::Comment)
                    .with_diary(diary.id)
                    .with_comment(comment.id),
            )
            .await;
        }

        Ok(comment)
    }

    /// List the comment thread for a diary the viewer can see
    pub async fn list_for_diary(
        &self,
        diary_id: i64,
        viewer: Option<&User>,
    ) -> Result<Vec<CommentWithMeta>, CommentServiceError> {
        let diary = self
            .diary_repo
            .get_by_id(diary_id)
            .await
            .context("Failed to load diary")?
            .ok_or(CommentServiceError::NotFound)?;

        let is_owner = viewer.map(|u| u.id == diary.author_id).unwrap_or(false);
        let is_admin = viewer.map(|u| u.is_admin()).unwrap_or(false);
        if !diary.is_publicly_visible() && !is_owner && !is_admin {
            return Err(CommentServiceError::NotFound);
        }

        Ok(self
            .comment_repo
            .get_by_diary(diary_id, viewer.map(|u| u.id))
            .await
            .context("Failed to list comments")?)
    }

    /// Delete a comment. Allowed for the comment author, the diary owner,
    /// and admins.
    pub async fn delete(&self, id: i64, user: &User) -> Result<(), CommentServiceError> {
        let comment = self
            .comment_repo
            .get_by_id(id)
            .await
            .context("Failed to load comment")?
            .ok_or(CommentServiceError::NotFound)?;

        let diary = self
            .diary_repo
            .get_by_id(comment.diary_id)
            .await
            .context("Failed to load diary")?
            .ok_or(CommentServiceError::NotFound)?;

        let allowed = user.is_admin() || user.id == comment.user_id || user.id == diary.author_id;
        if !allowed {
            return Err(CommentServiceError::Forbidden);
        }

        let deleted = self
            .comment_repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(CommentServiceError::NotFound);
        }

        self.diary_repo
            .recount_comments(diary.id)
            .await
            .context("Failed to recount comments")?;

        Ok(())
    }

    /// Toggle a like on a diary or comment.
    ///
    /// Returns the new liked state and count. Diary like counts are
    /// denormalized onto the diary row; comment counts are computed.
    pub async fn toggle_like(
        &self,
        user: &User,
        target_type: LikeTargetType,
        target_id: i64,
    ) -> Result<LikeToggle, CommentServiceError> {
        // The target must exist and be visible to the user
        let owner_and_diary = match target_type {
            LikeTargetType::Diary => {
                let diary = self.visible_diary(target_id, user).await?;
                (diary.author_id, diary.id)
            }
            LikeTargetType::Comment => {
                let comment = self
                    .comment_repo
                    .get_by_id(target_id)
                    .await
                    .context("Failed to load comment")?
                    .ok_or(CommentServiceError::NotFound)?;
                self.visible_diary(comment.diary_id, user).await?;
                (comment.user_id, comment.diary_id)
            }
        };

        let liked = if self
            .comment_repo
            .is_liked(target_type, target_id, user.id)
            .await
            .context("Failed to check like")?
        {
            self.comment_repo
                .remove_like(target_type, target_id, user.id)
                .await
                .context("Failed to remove like")?;
            if target_type == LikeTargetType::Diary {
                self.diary_repo
                    .adjust_like_count(target_id, -1)
                    .await
                    .context("Failed to adjust like count")?;
            }
            false
        } else {
            self.comment_repo
                .add_like(target_type, target_id, user.id)
                .await
                .context("Failed to add like")?;
            if target_type == LikeTargetType::Diary {
                self.diary_repo
                    .adjust_like_count(target_id, 1)
                    .await
                    .context("Failed to adjust like count")?;
            }

            let (owner_id, diary_id) = owner_and_diary;
            if owner_id != user.id {
                let mut notification =
                    Notification::new(owner_id, Some(user.id), NotificationKind::Like)
                        .with_diary(diary_id);
                if target_type == LikeTargetType::Comment {
                    notification = notification.with_comment(target_id);
                }
                self.notify(notification).await;
            }
            true
        };

        let count = self
            .comment_repo
            .like_count(target_type, target_id)
            .await
            .context("Failed to count likes")?;

        Ok(LikeToggle { liked, count })
    }

    /// Whether the user has liked the target
    pub async fn check_like(
        &self,
        user_id: i64,
        target_type: LikeTargetType,
        target_id: i64,
    ) -> Result<bool, CommentServiceError> {
        Ok(self
            .comment_repo
            .is_liked(target_type, target_id, user_id)
            .await
            .context("Failed to check like")?)
    }

    /// Load a diary, treating anything the user can't see as missing
    async fn visible_diary(&self, diary_id: i64, user: &User) -> Result<Diary, CommentServiceError> {
        let diary = self
            .diary_repo
            .get_by_id(diary_id)
            .await
            .context("Failed to load diary")?
            .ok_or(CommentServiceError::NotFound)?;

        if !diary.is_publicly_visible() && diary.author_id != user.id && !user.is_admin() {
            return Err(CommentServiceError::NotFound);
        }

        Ok(diary)
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notification_repo.create(&notification).await {
            tracing::warn!("Failed to insert notification: {}", e);
        }
    }
}
