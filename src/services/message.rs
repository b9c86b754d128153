//! Message service
//!
//! Server-stored chat between two users. Fetching a conversation marks the
//! peer's messages read; the conversation list is folded in memory from
//! the user's message history.

use crate::db::repositories::{MessageRepository, UserRepository};
use crate::models::{ConversationSummary, ListParams, Message, PagedResult, User};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum message length
const MAX_MESSAGE_LEN: usize = 2000;

/// Error types for message service operations
#[derive(Debug, thiserror::Error)]
pub enum MessageServiceError {
    #[error("User not found")]
    UserNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Message service
pub struct MessageService {
    message_repo: Arc<dyn MessageRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl MessageService {
    /// Create a new message service
    pub fn new(
        message_repo: Arc<dyn MessageRepository>,
        user_repo: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            message_repo,
            user_repo,
        }
    }

    /// Send a message to another user
    pub async fn send(
        &self,
        sender_id: i64,
        recipient_id: i64,
        content: &str,
    ) -> Result<Message, MessageServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessageServiceError::ValidationError(
                "Message must not be empty".to_string(),
            ));
        }
        if content.len() > MAX_MESSAGE_LEN {
            return Err(MessageServiceError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LEN
            )));
        }
        if sender_id == recipient_id {
            return Err(MessageServiceError::ValidationError(
                "You cannot message yourself".to_string(),
            ));
        }

        self.user_repo
            .get_by_id(recipient_id)
            .await
            .context("Failed to load recipient")?
            .ok_or(MessageServiceError::UserNotFound)?;

        Ok(self
            .message_repo
            .create(sender_id, recipient_id, content)
            .await
            .context("Failed to create message")?)
    }

    /// Fetch a conversation page with a peer. Incoming messages from the
    /// peer are marked read as a side effect.
    pub async fn conversation(
        &self,
        user_id: i64,
        peer_id: i64,
        params: ListParams,
    ) -> Result<PagedResult<Message>, MessageServiceError> {
        self.user_repo
            .get_by_id(peer_id)
            .await
            .context("Failed to load peer")?
            .ok_or(MessageServiceError::UserNotFound)?;

        self.message_repo
            .mark_read_from(user_id, peer_id)
            .await
            .context("Failed to mark messages read")?;

        let (items, total) = self
            .message_repo
            .conversation(user_id, peer_id, &params)
            .await
            .context("Failed to fetch conversation")?;

        Ok(PagedResult::new(items, total, &params))
    }

    /// Unread message count across all conversations, polled by clients
    pub async fn unread_count(&self, user_id: i64) -> Result<i64, MessageServiceError> {
        Ok(self
            .message_repo
            .unread_count(user_id)
            .await
            .context("Failed to count unread messages")?)
    }

    /// Conversation summaries for the user, most recent conversation first.
    ///
    /// Folds the user's full message history in memory: one entry per peer
    /// carrying the latest message and unread count.
    pub async fn summaries(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, MessageServiceError> {
        let messages = self
            .message_repo
            .list_involving(user_id)
            .await
            .context("Failed to list messages")?;

        // Messages arrive newest first, so the first message per peer is
        // the conversation head
        let mut order: Vec<i64> = Vec::new();
        let mut latest: HashMap<i64, &Message> = HashMap::new();
        let mut unread: HashMap<i64, i64> = HashMap::new();

        for message in &messages {
            let peer_id = if message.sender_id == user_id {
                message.recipient_id
            } else {
                message.sender_id
            };

            if !latest.contains_key(&peer_id) {
                latest.insert(peer_id, message);
                order.push(peer_id);
            }
            if message.recipient_id == user_id && !message.read {
                *unread.entry(peer_id).or_insert(0) += 1;
            }
        }

        let mut summaries = Vec::with_capacity(order.len());
        for peer_id in order {
            let head = latest[&peer_id];
            let peer = match self
                .user_repo
                .get_by_id(peer_id)
                .await
                .context("Failed to load peer")?
            {
                Some(peer) => peer,
                // Deleted account, drop the conversation from the list
                None => continue,
            };

            summaries.push(ConversationSummary {
                peer_id,
                peer_username: peer.username,
                peer_display_name: peer.display_name,
                peer_avatar: peer.avatar,
                last_message: head.content.clone(),
                last_message_at: head.created_at,
                unread_count: unread.get(&peer_id).copied().unwrap_or(0),
            });
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxMessageRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserRole;

    async fn setup() -> (DynDatabasePool, MessageService, User, User, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::new(pool.clone());
        let mut users = Vec::new();
        for name in ["ana", "bo", "cy"] {
            users.push(
                user_repo
                    .create(&User::new(
                        name.to_string(),
                        format!("{}@example.com", name),
                        "hash".to_string(),
                        UserRole::Member,
                    ))
                    .await
                    .unwrap(),
            );
        }

        let service = MessageService::new(
            SqlxMessageRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
        );

        let cy = users.pop().unwrap();
        let bo = users.pop().unwrap();
        let ana = users.pop().unwrap();
        (pool, service, ana, bo, cy)
    }

    #[tokio::test]
    async fn test_send_and_fetch_conversation() {
        let (_pool, service, ana, bo, _cy) = setup().await;

        service.send(ana.id, bo.id, "hello bo").await.unwrap();
        service.send(bo.id, ana.id, "hi ana").await.unwrap();

        let page = service
            .conversation(ana.id, bo.id, ListParams::default())
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].content, "hello bo");
        assert_eq!(page.items[1].content, "hi ana");
    }

    #[tokio::test]
    async fn test_send_validation() {
        let (_pool, service, ana, bo, _cy) = setup().await;

        assert!(matches!(
            service.send(ana.id, bo.id, "   ").await,
            Err(MessageServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.send(ana.id, ana.id, "talking to myself").await,
            Err(MessageServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.send(ana.id, 9999, "anyone there?").await,
            Err(MessageServiceError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_fetching_conversation_marks_read() {
        let (_pool, service, ana, bo, _cy) = setup().await;

        service.send(ana.id, bo.id, "one").await.unwrap();
        service.send(ana.id, bo.id, "two").await.unwrap();

        assert_eq!(service.unread_count(bo.id).await.unwrap(), 2);

        service
            .conversation(bo.id, ana.id, ListParams::default())
            .await
            .unwrap();

        assert_eq!(service.unread_count(bo.id).await.unwrap(), 0);
        // The sender's unread count is unaffected
        assert_eq!(service.unread_count(ana.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_summaries_group_by_peer() {
        let (_pool, service, ana, bo, cy) = setup().await;

        service.send(ana.id, bo.id, "to bo").await.unwrap();
        service.send(cy.id, ana.id, "from cy").await.unwrap();
        service.send(cy.id, ana.id, "again from cy").await.unwrap();

        let summaries = service.summaries(ana.id).await.unwrap();

        assert_eq!(summaries.len(), 2);
        // Most recent conversation first
        assert_eq!(summaries[0].peer_username, "cy");
        assert_eq!(summaries[0].last_message, "again from cy");
        assert_eq!(summaries[0].unread_count, 2);

        assert_eq!(summaries[1].peer_username, "bo");
        assert_eq!(summaries[1].unread_count, 0);
    }

    #[tokio::test]
    async fn test_summaries_empty_for_new_user() {
        let (_pool, service, ana, _bo, _cy) = setup().await;

        let summaries = service.summaries(ana.id).await.unwrap();
        assert!(summaries.is_empty());
    }
}
