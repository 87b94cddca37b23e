use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_relay::{
    api::{create_router, AppState},
    chat::ChatService,
    config::Config,
    db::SummaryRepository,
    error::AppError,
    realtime::{Hub, ServerEvent},
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting chat-relay server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!("✅ Configuration loaded");

    // Setup database with proper connection pooling
    let db = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    tracing::info!("✅ Database connected: {}", config.database_url);

    // Run migrations
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("✅ Database migrations completed");

    // Fan-out hub; all presence and subscription state lives here and
    // is rebuilt by clients after a restart
    let hub = Hub::new(config.max_rooms_per_connection);
    let service = ChatService::new(db.clone(), hub.clone());

    // Heartbeat: periodic ping to every connection, independent of
    // message traffic
    {
        let hub = hub.clone();
        let interval_secs = config.heartbeat_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                hub.broadcast_all(ServerEvent::ping_now()).await;
            }
        });
        tracing::info!(
            "✅ Heartbeat task started ({}s interval)",
            config.heartbeat_interval_secs
        );
    }

    // Summary reconciliation: the append/refresh sequence is not
    // atomic, so recompute projections from the log tail periodically
    {
        let db = db.clone();
        let interval_secs = config.reconcile_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                match SummaryRepository::reconcile(&db).await {
                    Ok(0) => tracing::debug!("🧹 Summaries already consistent"),
                    Ok(n) => tracing::info!("🧹 Repaired {} stale summaries", n),
                    Err(e) => tracing::error!("❌ Summary reconciliation failed: {}", e),
                }
            }
        });
        tracing::info!(
            "✅ Summary reconciliation task started (runs every {}s)",
            config.reconcile_interval_secs
        );
    }

    // Create shared application state and router
    let state = AppState {
        db,
        service,
        config: config.clone(),
    };
    let app = create_router(state);

    // Bind and serve
    let addr = config.server_address();
    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/api/health", addr);
    tracing::info!("");
    tracing::info!("📚 API Endpoints:");
    tracing::info!("  GET  /ws                          - Realtime channel");
    tracing::info!("  POST /api/rooms/group             - Create group room");
    tracing::info!("  POST /api/rooms/:roomId/join      - Join room");
    tracing::info!("  GET  /api/messages/:roomId        - Message history");
    tracing::info!("  POST /api/chats/direct            - Get or create direct chat");
    tracing::info!("  POST /api/chats/:chatId/messages  - Send direct message");
    tracing::info!("  POST /api/chats/:chatId/read      - Mark messages read");
    tracing::info!("  GET  /api/conversations           - List conversations for user");
    tracing::info!("  GET  /api/users/:id               - Get profile");
    tracing::info!("  PUT  /api/users/:id               - Upsert profile");
    tracing::info!("");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
