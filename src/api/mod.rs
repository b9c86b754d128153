//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the Dayline backend:
//! - Auth endpoints (register/login/logout/profile)
//! - Diary endpoints (CRUD, explore, feed)
//! - Tag endpoints
//! - User profile and follow endpoints
//! - Comment and like endpoints
//! - Notification and announcement endpoints
//! - Chat message endpoints
//! - Lucky card endpoints
//! - Feedback endpoints
//! - Upload endpoint and static file serving for uploads
//! - Admin endpoints

pub mod admin;
pub mod announcements;
pub mod auth;
pub mod cards;
pub mod comments;
pub mod common;
pub mod diaries;
pub mod feedback;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod responses;
pub mod tags;
pub mod upload;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(diaries::protected_router())
        .merge(comments::protected_router())
        .nest("/users", users::protected_router())
        .nest("/notifications", notifications::router())
        .nest("/messages", messages::router())
        .nest("/feedback", feedback::router())
        .nest("/cards", cards::protected_router())
        .nest("/upload", upload::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; optional auth resolves the viewer for visibility and
    // is_liked/relationship flags
    let public_routes = Router::new()
        .nest("/auth", auth::public_router())
        .merge(diaries::public_router())
        .merge(comments::public_router())
        .nest("/users", users::public_router())
        .nest("/tags", tags::router())
        .nest("/announcements", announcements::router())
        .nest("/cards", cards::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    public_routes.merge(admin_routes).merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let upload_dir = state.upload_config.path.clone();

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        // Uploaded media is served statically
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(
            ServiceBuilder::new()
                // Request stats run for all requests, outermost
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::request_stats_middleware,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::{CacheConfig, UploadConfig};
    use crate::db::repositories::{
        SqlxAnnouncementRepository, SqlxCardRepository, SqlxCommentRepository,
        SqlxDiaryRepository, SqlxFeedbackRepository, SqlxFollowRepository, SqlxMediaRepository,
        SqlxMessageRepository, SqlxNotificationRepository, SqlxSessionRepository,
        SqlxTagRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::{
        AnnouncementService, CardService, CommentService, DiaryService, FeedbackService,
        FollowService, LoginRateLimiter, MessageService, NotificationService, TagService,
        UserService,
    };
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn test_server() -> TestServer {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = create_cache(&CacheConfig::default())
            .await
            .expect("Failed to create cache");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let diary_repo = SqlxDiaryRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let follow_repo = SqlxFollowRepository::boxed(pool.clone());
        let notification_repo = SqlxNotificationRepository::boxed(pool.clone());
        let announcement_repo = SqlxAnnouncementRepository::boxed(pool.clone());
        let feedback_repo = SqlxFeedbackRepository::boxed(pool.clone());
        let card_repo = SqlxCardRepository::boxed(pool.clone());
        let message_repo = SqlxMessageRepository::boxed(pool.clone());
        let media_repo = SqlxMediaRepository::boxed(pool.clone());

        let tag_service = Arc::new(TagService::new(tag_repo.clone(), cache.clone()));

        let state = AppState {
            pool: pool.clone(),
            user_service: Arc::new(UserService::new(user_repo.clone(), session_repo)),
            diary_service: Arc::new(DiaryService::new(
                diary_repo.clone(),
                comment_repo.clone(),
                media_repo.clone(),
                tag_service.clone(),
                cache.clone(),
            )),
            tag_service,
            comment_service: Arc::new(CommentService::new(
                comment_repo.clone(),
                diary_repo.clone(),
                notification_repo.clone(),
            )),
            follow_service: Arc::new(FollowService::new(
                follow_repo.clone(),
                user_repo.clone(),
                notification_repo.clone(),
            )),
            notification_service: Arc::new(NotificationService::new(notification_repo.clone())),
            announcement_service: Arc::new(AnnouncementService::new(
                announcement_repo,
                notification_repo,
            )),
            feedback_service: Arc::new(FeedbackService::new(feedback_repo)),
            card_service: Arc::new(CardService::new(card_repo)),
            message_service: Arc::new(MessageService::new(message_repo, user_repo.clone())),
            user_repo,
            diary_repo,
            comment_repo,
            follow_repo,
            media_repo,
            upload_config: Arc::new(UploadConfig::default()),
            request_stats: Arc::new(RequestStats::new()),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
        };

        let app = build_router(state, "http://localhost:3000");
        TestServer::new(app).expect("Failed to build test server")
    }

    /// Register a user and return their bearer token
    async fn register(server: &TestServer, username: &str) -> String {
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "password123",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["token"]
            .as_str()
            .expect("token in response")
            .to_string()
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[tokio::test]
    async fn test_register_login_me_flow() {
        let server = test_server().await;

        let token = register(&server, "firstuser").await;

        let me = server
            .get("/api/v1/auth/me")
            .add_header("authorization", bearer(&token))
            .await;
        me.assert_status_ok();
        let body = me.json::<Value>();
        assert_eq!(body["username"], "firstuser");
        // The first user becomes admin
        assert_eq!(body["role"], "admin");

        // Second registration is a plain member
        register(&server, "seconduser").await;
        let login = server
            .post("/api/v1/auth/login")
            .json(&json!({
                "username_or_email": "seconduser",
                "password": "password123",
            }))
            .await;
        login.assert_status_ok();
        assert_eq!(login.json::<Value>()["user"]["role"], "member");
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflict() {
        let server = test_server().await;
        register(&server, "taken").await;

        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "username": "taken",
                "email": "other@example.com",
                "password": "password123",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
        assert_eq!(response.json::<Value>()["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_protected_route_requires_auth() {
        let server = test_server().await;

        let response = server
            .post("/api/v1/diaries")
            .json(&json!({"title": "x", "content": "y"}))
            .await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_private_diary_never_in_explore() {
        let server = test_server().await;
        let token = register(&server, "writer").await;

        let created = server
            .post("/api/v1/diaries")
            .add_header("authorization", bearer(&token))
            .json(&json!({
                "title": "hidden entry",
                "content": "only mine",
                "visibility": "private",
                "status": "published",
            }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let diary_id = created.json::<Value>()["id"].as_i64().unwrap();

        // Explore shows nothing
        let explore = server.get("/api/v1/explore").await;
        explore.assert_status_ok();
        assert_eq!(explore.json::<Value>()["total"], 0);

        // Another user's direct fetch is NOT_FOUND
        let other_token = register(&server, "reader").await;
        let response = server
            .get(&format!("/api/v1/diaries/{}", diary_id))
            .add_header("authorization", bearer(&other_token))
            .await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);

        // The author still sees it
        let own = server
            .get(&format!("/api/v1/diaries/{}", diary_id))
            .add_header("authorization", bearer(&token))
            .await;
        own.assert_status_ok();
    }

    #[tokio::test]
    async fn test_like_toggle_roundtrip_via_api() {
        let server = test_server().await;
        let author_token = register(&server, "author").await;
        let liker_token = register(&server, "liker").await;

        let created = server
            .post("/api/v1/diaries")
            .add_header("authorization", bearer(&author_token))
            .json(&json!({
                "title": "likeable",
                "content": "text",
                "status": "published",
            }))
            .await;
        let diary_id = created.json::<Value>()["id"].as_i64().unwrap();

        let like = server
            .post("/api/v1/likes/toggle")
            .add_header("authorization", bearer(&liker_token))
            .json(&json!({"target_type": "diary", "target_id": diary_id}))
            .await;
        like.assert_status_ok();
        let body = like.json::<Value>();
        assert_eq!(body["liked"], true);
        assert_eq!(body["count"], 1);

        let unlike = server
            .post("/api/v1/likes/toggle")
            .add_header("authorization", bearer(&liker_token))
            .json(&json!({"target_type": "diary", "target_id": diary_id}))
            .await;
        let body = unlike.json::<Value>();
        assert_eq!(body["liked"], false);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_follow_comment_notification_flow() {
        let server = test_server().await;
        let author_token = register(&server, "journaler").await;
        let fan_token = register(&server, "fan").await;

        // IDs: first registered user is 1, second is 2
        let follow = server
            .post("/api/v1/users/1/follow")
            .add_header("authorization", bearer(&fan_token))
            .await;
        follow.assert_status_ok();

        let created = server
            .post("/api/v1/diaries")
            .add_header("authorization", bearer(&author_token))
            .json(&json!({
                "title": "public day",
                "content": "words",
                "status": "published",
            }))
            .await;
        let diary_id = created.json::<Value>()["id"].as_i64().unwrap();

        // The diary shows up in the fan's feed
        let feed = server
            .get("/api/v1/feed")
            .add_header("authorization", bearer(&fan_token))
            .await;
        feed.assert_status_ok();
        assert_eq!(feed.json::<Value>()["total"], 1);

        // Fan comments; author picks up follow + comment notifications
        let comment = server
            .post("/api/v1/comments")
            .add_header("authorization", bearer(&fan_token))
            .json(&json!({"diary_id": diary_id, "content": "beautiful"}))
            .await;
        comment.assert_status(axum::http::StatusCode::CREATED);

        let unread = server
            .get("/api/v1/notifications/unread-count")
            .add_header("authorization", bearer(&author_token))
            .await;
        assert_eq!(unread.json::<Value>()["unread"], 2);
    }

    #[tokio::test]
    async fn test_card_draw_limit_via_api() {
        let server = test_server().await;
        let token = register(&server, "gambler").await;

        let first = server
            .post("/api/v1/cards/draw")
            .add_header("authorization", bearer(&token))
            .await;
        first.assert_status_ok();
        assert!(first.json::<Value>()["card"]["name"].is_string());

        let second = server
            .post("/api/v1/cards/draw")
            .add_header("authorization", bearer(&token))
            .await;
        second.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_admin_routes_forbidden_for_members() {
        let server = test_server().await;
        let _admin_token = register(&server, "theadmin").await;
        let member_token = register(&server, "pleb").await;

        let response = server
            .get("/api/v1/admin/dashboard")
            .add_header("authorization", bearer(&member_token))
            .await;
        response.assert_status(axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_dashboard_totals() {
        let server = test_server().await;
        let admin_token = register(&server, "theadmin").await;
        register(&server, "somebody").await;

        let response = server
            .get("/api/v1/admin/dashboard")
            .add_header("authorization", bearer(&admin_token))
            .await;
        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["total_users"], 2);
        assert_eq!(body["total_diaries"], 0);
    }

    #[tokio::test]
    async fn test_announcement_broadcast_via_api() {
        let server = test_server().await;
        let admin_token = register(&server, "theadmin").await;
        let member_token = register(&server, "member").await;

        let created = server
            .post("/api/v1/admin/announcements")
            .add_header("authorization", bearer(&admin_token))
            .json(&json!({
                "title": "maintenance window",
                "content": "down at midnight",
                "published": true,
            }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);

        // Member sees the published announcement and a notification
        let list = server.get("/api/v1/announcements").await;
        list.assert_status_ok();
        assert_eq!(list.json::<Value>()["total"], 1);

        let unread = server
            .get("/api/v1/notifications/unread-count")
            .add_header("authorization", bearer(&member_token))
            .await;
        assert_eq!(unread.json::<Value>()["unread"], 1);
    }

    #[tokio::test]
    async fn test_message_roundtrip_via_api() {
        let server = test_server().await;
        let ana_token = register(&server, "ana").await;
        let bo_token = register(&server, "bo").await;

        let sent = server
            .post("/api/v1/messages")
            .add_header("authorization", bearer(&ana_token))
            .json(&json!({"recipient_id": 2, "content": "hello"}))
            .await;
        sent.assert_status(axum::http::StatusCode::CREATED);

        let unread = server
            .get("/api/v1/messages/unread-count")
            .add_header("authorization", bearer(&bo_token))
            .await;
        assert_eq!(unread.json::<Value>()["unread"], 1);

        // Fetching the conversation marks it read
        let conversation = server
            .get("/api/v1/messages/1")
            .add_header("authorization", bearer(&bo_token))
            .await;
        conversation.assert_status_ok();
        assert_eq!(conversation.json::<Value>()["total"], 1);

        let unread = server
            .get("/api/v1/messages/unread-count")
            .add_header("authorization", bearer(&bo_token))
            .await;
        assert_eq!(unread.json::<Value>()["unread"], 0);
    }

    #[tokio::test]
    async fn test_tag_listing_via_api() {
        let server = test_server().await;
        let token = register(&server, "tagger").await;

        server
            .post("/api/v1/diaries")
            .add_header("authorization", bearer(&token))
            .json(&json!({
                "title": "tagged entry",
                "content": "text",
                "status": "published",
                "tags": ["rainy days", "tea"],
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let tags = server.get("/api/v1/tags").await;
        tags.assert_status_ok();
        let body = tags.json::<Value>();
        assert_eq!(body["tags"].as_array().unwrap().len(), 2);

        let by_tag = server.get("/api/v1/tags/rainy-days/diaries").await;
        by_tag.assert_status_ok();
        assert_eq!(by_tag.json::<Value>()["total"], 1);
    }
}
