use std::net::SocketAddr;
use std::sync::Arc;

use clearwave_api::config::ServerConfig;
use clearwave_api::router::build_app_router;
use clearwave_api::state::AppState;
use clearwave_enhancer::{Enhancer, EnhancerHandle};
use clearwave_pipeline::{EnhancementRunner, RunnerSettings};
use clearwave_worker::recovery::recover;
use clearwave_worker::TaskDispatcher;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clearwave_api=debug,clearwave_pipeline=debug,clearwave_worker=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        workers = config.worker_concurrency,
        enhancer = ?config.enhancer.backend,
        "Loaded server configuration",
    );

    // --- Database ---
    let pool = clearwave_db::create_pool(&config.database_url)
        .await
        .expect("Failed to open database");
    tracing::info!("Database connection pool created");

    clearwave_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    clearwave_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Enhancement model ---
    let enhancer = EnhancerHandle::start(&config.enhancer).await;

    // --- Dispatcher ---
    let runner = EnhancementRunner::new(
        pool.clone(),
        Arc::clone(&enhancer) as Arc<dyn Enhancer>,
        RunnerSettings {
            timeout: config.enhance_timeout(),
            ..RunnerSettings::default()
        },
    );
    let dispatcher = TaskDispatcher::start(Arc::new(runner), config.dispatcher());

    // Waiting jobs are resubmitted in the background while the server starts.
    recover(&pool, &dispatcher)
        .await
        .expect("Failed to recover jobs from previous run");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        dispatcher: Arc::clone(&dispatcher),
        enhancer: Arc::clone(&enhancer),
    };
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

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Running jobs finish first; they still hold the model.
    dispatcher.shutdown(config.shutdown_timeout()).await;
    enhancer.shutdown().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
