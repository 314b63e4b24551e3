//! Pipeline worker binary.
//!
//! Polls the durable run store for due workflow runs and executes them.
//! The API binary only publishes events; everything that actually calls
//! external providers happens here, so the worker can be scaled and
//! restarted independently of the HTTP surface.

use std::sync::Arc;

use docureel_engine::{EventRouter, Scheduler, WorkflowRegistry};
use docureel_pipeline::{register_workflows, PgStore, PipelineConfig, PipelineDeps};
use docureel_providers::{
    HttpAvatarRenderer, HttpImageGenerator, HttpScriptGenerator, HttpSpeechSynthesizer,
    HttpVideoGenerator,
};
use docureel_storage::{S3BlobStore, S3Config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docureel_worker=debug,docureel_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = docureel_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

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
        store,
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

    // --- Engine ---
    let registry = Arc::new(register_workflows(WorkflowRegistry::new(), deps));
    let run_store = Arc::new(docureel_engine::pg::PgRunStore::new(pool));
    let bus = Arc::new(docureel_events::EventBus::default());
    let router = Arc::new(EventRouter::new(
        run_store.clone(),
        registry.clone(),
        bus,
    ));
    let scheduler = Scheduler::new(run_store, registry, router);

    // --- Shutdown wiring ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    tracing::info!("Worker started, polling for due runs");
    scheduler.run(cancel).await;
    tracing::info!("Worker shut down");
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
