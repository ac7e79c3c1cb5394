//! Drama server binary
//!
//! REST API for uploading novels, parsing them into episodes in the
//! background, and extracting scene backgrounds per episode.

use anyhow::Context;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use drama_orchestrator::api::{create_router_with_cors, AppState};
use drama_orchestrator::config::ServerConfig;
use drama_orchestrator::db::{DatabaseConnection, DramaStore, SqliteDramaStore};
use drama_orchestrator::document::FileParser;
use drama_orchestrator::llm::OpenAiCompatibleClient;
use drama_orchestrator::pipelines::{build_engine, PipelineDeps};
use drama_orchestrator::{TaskController, TaskScheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    tracing::info!("Loading server configuration...");
    let config = ServerConfig::load().context("invalid server configuration")?;

    tracing::info!("Database Path: {}", config.database.path);
    tracing::info!("Upload Dir: {}", config.storage.upload_dir.display());
    tracing::info!(
        "LLM: {} at {}",
        config.llm.model,
        config.llm.base_url
    );
    if config.llm.api_key.is_empty() {
        tracing::warn!("No LLM API key configured; set DRAMA_LLM_API_KEY");
    }

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.bind_address()))?;

    if let Some(parent) = Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }

    let database_url = config.database_url();
    tracing::info!("Connecting to database: {}", database_url);
    let db = DatabaseConnection::with_max_connections(&database_url, config.database.max_connections)
        .await
        .context("database connection failed")?;

    tracing::info!("Running database migrations");
    db.run_migrations().await?;
    db.health_check().await?;

    let controller = Arc::new(TaskController::new(db.clone()));
    let store: Arc<dyn DramaStore> = Arc::new(SqliteDramaStore::new(db.clone()));
    let generator = Arc::new(OpenAiCompatibleClient::new(config.llm.clone())?);

    let engine = build_engine(
        controller.clone(),
        PipelineDeps {
            generator,
            parser: Arc::new(FileParser::new()),
            store: store.clone(),
            executor: config.executor.clone(),
            prompts: config.prompts.clone(),
        },
    );
    let scheduler = Arc::new(TaskScheduler::start(Arc::new(engine), config.workers.clone()));

    let state = AppState {
        db: db.clone(),
        controller,
        scheduler: scheduler.clone(),
        store,
        storage: config.storage.clone(),
        server_name: config.server.name.clone(),
    };

    tracing::info!("Building API router");
    let app = create_router_with_cors(state, &config.server.allowed_origins);

    tracing::info!("Starting {} on {}", config.server.name, addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP listener closed, draining running tasks");
    scheduler.shutdown().await;
    db.close().await;

    tracing::info!("Drama server shut down gracefully");
    Ok(())
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL-C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL-C signal, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down");
        }
    }
}
