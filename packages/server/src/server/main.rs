// Main entry point for the forum API server and its moderation worker

use std::sync::Arc;

use anyhow::{Context, Result};
use forum_core::domains::auth::JwtService;
use forum_core::domains::moderation::register_jobs;
use forum_core::kernel::jobs::{JobQueue, JobRegistry, JobRunner, JobRunnerConfig, PostgresJobQueue};
use forum_core::kernel::{BaseAI, OpenAIModerationClient, PostgresPostStore, ServerDeps, UnconfiguredAI};
use forum_core::{server::build_app, Config};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,forum_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting forum API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        moderation_enabled = config.moderation.enabled,
        auto_approve = config.moderation.auto_approve_enabled,
        approve_threshold = config.moderation.approve_threshold,
        auto_reject = config.moderation.auto_reject_enabled,
        reject_threshold = config.moderation.reject_threshold,
        "Configuration loaded"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let ai: Arc<dyn BaseAI> = match &config.openai_api_key {
        Some(key) => Arc::new(
            OpenAIModerationClient::new(key.clone(), config.moderation.model.clone())
                .context("Failed to create OpenAI client")?,
        ),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; posts will wait for manual moderation");
            Arc::new(UnconfiguredAI)
        }
    };

    let job_queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(pool.clone()));
    let deps = Arc::new(ServerDeps::new(
        Arc::new(PostgresPostStore::new(pool.clone())),
        ai,
        job_queue.clone(),
        Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone())),
        config.moderation.clone(),
    ));

    // Job registry and runner
    let mut job_registry = JobRegistry::new();
    register_jobs(&mut job_registry);

    let shutdown = CancellationToken::new();
    let runner = JobRunner::with_config(
        job_queue,
        Arc::new(job_registry),
        deps.clone(),
        JobRunnerConfig::default().poll_interval(config.worker_poll_interval),
    );
    let runner_shutdown = shutdown.clone();
    let runner_handle = tokio::spawn(async move {
        if let Err(e) = runner.run(runner_shutdown).await {
            tracing::error!(error = %e, "Job runner exited with error");
        }
    });

    let app = build_app(deps, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await
        .context("Server error")?;

    // Let in-flight jobs finish
    shutdown.cancel();
    if let Err(e) = runner_handle.await {
        tracing::error!(error = %e, "Job runner task failed");
    }

    tracing::info!("Server stopped");
    Ok(())
}
