use std::net::SocketAddr;
use std::sync::Arc;

use docureel_api::{build_app_router, AppState, ServerConfig};
use docureel_engine::{EventRouter, WorkflowRegistry};
use docureel_pipeline::{register_workflows, PgStore, PipelineConfig, PipelineDeps};
use docureel_providers::{
    HttpAvatarRenderer, HttpImageGenerator, HttpScriptGenerator, HttpSpeechSynthesizer,
    HttpVideoGenerator,
};
use docureel_storage::{S3BlobStore, S3Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docureel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = docureel_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    docureel_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    docureel_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Pipeline dependencies ---
    let store = Arc::new(PgStore::new(pool.clone()));
    let blobs = Arc::new(
        S3Config::from_env()
            .map(S3BlobStore::new)
            .expect("Invalid object storage configuration"),
    );
    let deps = Arc::new(PipelineDeps {
        store: store.clone(),
        blobs,
        scripts: Arc::new(
            HttpScriptGenerator::from_env().expect("Invalid script provider configuration"),
        ),
        tts: Arc::new(
            HttpSpeechSynthesizer::from_env().expect("Invalid TTS provider configuration"),
        ),
        avatars: Arc::new(
            HttpAvatarRenderer::from_env().expect("Invalid avatar provider configuration"),
        ),
        images: Arc::new(
            HttpImageGenerator::from_env().expect("Invalid image provider configuration"),
        ),
        videos: Arc::new(
            HttpVideoGenerator::from_env().expect("Invalid video provider configuration"),
        ),
        config: PipelineConfig::default(),
    });

    // --- Event router ---
    // The API publishes trigger events; the worker binary executes the
    // runs they create. Both share the durable run store.
    let registry = Arc::new(register_workflows(WorkflowRegistry::new(), deps));
    let run_store = Arc::new(docureel_engine::pg::PgRunStore::new(pool.clone()));
    let bus = Arc::new(docureel_events::EventBus::default());
    let router = Arc::new(EventRouter::new(run_store, registry, bus));
    tracing::info!("Event router created");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        store,
        router,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shut down");
}

/// Wait for Ctrl-C or SIGTERM to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
