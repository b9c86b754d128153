//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod announcement;
pub mod card;
pub mod comment;
pub mod diary;
pub mod feedback;
pub mod follow;
pub mod media;
pub mod message;
pub mod notification;
pub mod session;
pub mod tag;
pub mod user;

pub use announcement::{AnnouncementRepository, SqlxAnnouncementRepository};
pub use card::{CardRepository, SqlxCardRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use diary::{DiaryRepository, SqlxDiaryRepository};
pub use feedback::{FeedbackRepository, SqlxFeedbackRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use media::{MediaRepository, SqlxMediaRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
