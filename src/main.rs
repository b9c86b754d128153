//! Dayline - A social diary and journaling platform

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dayline::{
    api::{self, AppState, RequestStats},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAnnouncementRepository, SqlxCardRepository, SqlxCommentRepository,
            SqlxDiaryRepository, SqlxFeedbackRepository, SqlxFollowRepository,
            SqlxMediaRepository, SqlxMessageRepository, SqlxNotificationRepository,
            SqlxSessionRepository, SqlxTagRepository, SqlxUserRepository,
        },
    },
    services::{
        announcement::AnnouncementService,
        card::CardService,
        comment::CommentService,
        diary::DiaryService,
        feedback::FeedbackService,
        follow::FollowService,
        message::MessageService,
        notification::NotificationService,
        tag::TagService,
        user::UserService,
        LoginRateLimiter,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dayline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Dayline...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized");

    // Create repositories
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

    // Initialize services
    let user_service = Arc::new(UserService::new(user_repo.clone(), session_repo));
    let tag_service = Arc::new(TagService::new(tag_repo, cache.clone()));
    let diary_service = Arc::new(DiaryService::new(
        diary_repo.clone(),
        comment_repo.clone(),
        media_repo.clone(),
        tag_service.clone(),
        cache.clone(),
    ));
    let comment_service = Arc::new(CommentService::new(
        comment_repo.clone(),
        diary_repo.clone(),
        notification_repo.clone(),
    ));
    let follow_service = Arc::new(FollowService::new(
        follow_repo.clone(),
        user_repo.clone(),
        notification_repo.clone(),
    ));
    let notification_service = Arc::new(NotificationService::new(notification_repo.clone()));
    let announcement_service = Arc::new(AnnouncementService::new(
        announcement_repo,
        notification_repo,
    ));
    let feedback_service = Arc::new(FeedbackService::new(feedback_repo));
    let card_service = Arc::new(CardService::new(card_repo));
    let message_service = Arc::new(MessageService::new(message_repo, user_repo.clone()));

    // Build application state
    let request_stats = Arc::new(RequestStats::new());
    let rate_limiter = Arc::new(LoginRateLimiter::new());

    let state = AppState {
        pool: pool.clone(),
        user_service: user_service.clone(),
        diary_service,
        tag_service,
        comment_service,
        follow_service,
        notification_service,
        announcement_service,
        feedback_service,
        card_service,
        message_service,
        user_repo,
        diary_repo,
        comment_repo,
        follow_repo,
        media_repo,
        upload_config: Arc::new(config.upload.clone()),
        request_stats,
        rate_limiter: rate_limiter.clone(),
    };

    // Rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Expired session purge task (runs hourly)
    {
        let user_service = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match user_service.purge_expired_sessions().await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!("Purged {} expired session(s)", count),
                    Err(e) => tracing::warn!("Session purge failed: {}", e),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
