use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use shorts_gen::app_state::AppState;
use shorts_gen::config::{AppConfig, StatusBackend};
use shorts_gen::db;
use shorts_gen::routes::{self, metrics::MetricsState, MULTIPART_OVERHEAD};
use shorts_gen::services::generation::GenerationClient;
use shorts_gen::services::status_store::{JobStatusStore, MemoryStatusStore, PgStatusStore};
use shorts_gen::services::watches::WatchRegistry;
use shorts_gen::watcher::TaskCompletionWatcher;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing shorts-gen server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("watch_started_total", "Task watches started, by mode");
    metrics::describe_counter!(
        "watch_outcomes_total",
        "Task watches ended, by outcome (completed, failed, timed_out, cancelled)"
    );
    metrics::describe_counter!("watch_poll_attempts_total", "Status reads made by poll sensors");
    metrics::describe_counter!(
        "watch_transient_failures_total",
        "Status reads or subscriptions that failed and were retried"
    );
    metrics::describe_counter!(
        "generation_requests_total",
        "Jobs submitted to the generation webhook, by type"
    );
    metrics::describe_gauge!("active_watches", "Watches currently observing a task");

    // Status store
    let (db_pool, store) = match config.status_backend {
        StatusBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL is required for the postgres status backend");

            tracing::info!("Connecting to PostgreSQL database");
            let pool = db::init_pool(database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            let store: Arc<dyn JobStatusStore> = Arc::new(PgStatusStore::new(pool.clone()));
            (Some(pool), store)
        }
        StatusBackend::Memory => {
            tracing::warn!("Using in-memory status store; statuses are not shared with the pipeline");
            let store: Arc<dyn JobStatusStore> = Arc::new(MemoryStatusStore::new());
            (None, store)
        }
    };

    let watch_options = config.watch_options();
    tracing::info!(
        mode = %watch_options.mode,
        timeout_ms = config.watch_timeout_ms,
        poll_interval_ms = config.poll_interval_ms,
        "Task watcher configured"
    );
    let watches = WatchRegistry::new(TaskCompletionWatcher::new(store), watch_options);

    let webhook_url = config.webhook_url();
    tracing::info!(url = %webhook_url, "Generation webhook configured");
    let generation = GenerationClient::new(webhook_url);

    // Create shared application state
    let state = AppState::new(db_pool, generation, watches, config.max_upload_bytes);
    let metrics_state = MetricsState {
        handle: prometheus_handle,
        watches: state.watches.clone(),
    };

    let app = routes::router(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(
            config.max_upload_bytes + MULTIPART_OVERHEAD,
        ));

    tracing::info!("Starting shorts-gen on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
