//! Data models
//!
//! This module contains all data structures used throughout the Dayline
//! backend. Models represent:
//! - Database entities (User, Session, Diary, Tag, Media, Comment, Like,
//!   Follow, Notification, Announcement, Feedback, LuckyCard, Message)
//! - Input types for create/update operations
//! - Pagination containers

mod announcement;
mod card;
mod comment;
mod diary;
mod feedback;
mod follow;
mod media;
mod message;
mod notification;
mod session;
mod tag;
mod user;

pub use announcement::{Announcement, CreateAnnouncementInput, UpdateAnnouncementInput};
pub use card::{CardDraw, CardDrawWithCard, CardRarity, LuckyCard};
pub use comment::{Comment, CommentWithMeta, CreateCommentInput, Like, LikeTargetType};
pub use diary::{
    CreateDiaryInput, Diary, DiaryStatus, DiaryVisibility, ListParams, PagedResult,
    UpdateDiaryInput,
};
pub use feedback::{Feedback, FeedbackStatus};
pub use follow::{Follow, FollowStats};
pub use media::Media;
pub use message::{ConversationSummary, Message};
pub use notification::{Notification, NotificationKind};
pub use session::Session;
pub use tag::{Tag, TagWithCount};
pub use user::{UpdateProfileInput, User, UserRole, UserStatus};
