// Main entry point for the secure chat API server

use std::sync::Arc;

use anyhow::{Context, Result};
use securechat_core::common::utils::ExpoClient;
use securechat_core::domains::auth::{JwtService, SocketSigner};
use securechat_core::domains::chat::effects::PushDispatcher;
use securechat_core::domains::chat::store::{ChatStore, PgChatStore};
use securechat_core::kernel::{
    BaseRealtimeTransport, JobQueue, NatsClientPublisher, NatsTransport, PgDirectory, ServerDeps,
    StreamHub,
};
use securechat_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,securechat_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Secure Chat API");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let store: Arc<dyn ChatStore> = Arc::new(PgChatStore::new(pool.clone()));
    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let stream_hub = StreamHub::new();

    // NATS when configured, otherwise the in-process hub behind /streams
    let transport: Arc<dyn BaseRealtimeTransport> = match &config.nats_url {
        Some(url) => {
            let client = async_nats::connect(url.as_str())
                .await
                .context("Failed to connect to NATS")?;
            tracing::info!(url = %url, "Publishing chat frames to NATS");
            Arc::new(NatsTransport::new(NatsClientPublisher::new(client)))
        }
        None => {
            tracing::info!("Publishing chat frames to the in-process stream hub");
            Arc::new(stream_hub.clone())
        }
    };

    let push_service = Arc::new(ExpoClient::new(config.expo_access_token.clone()));

    let dispatcher = PushDispatcher::new(
        store.clone(),
        directory.clone(),
        directory.clone(),
        push_service.clone(),
        config.chat.push_freshness,
    );
    let push_jobs = JobQueue::spawn("push", Arc::new(dispatcher));

    let deps = ServerDeps::new(
        store,
        directory.clone(),
        directory,
        transport,
        push_service,
        push_jobs,
        Arc::new(SocketSigner::new(
            config.socket_app_key.clone(),
            config.socket_app_secret.clone(),
        )),
        Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone())),
        stream_hub,
        config.chat.clone(),
    );

    let app = build_app(deps);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
