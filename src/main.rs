use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use aoi_sorter::app_state::AppState;
use aoi_sorter::config::AppConfig;
use aoi_sorter::routes;
use aoi_sorter::services::ingest::IngestionController;

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

    tracing::info!(
        watch_root = %config.watch_root.display(),
        output_root = %config.output_root.display(),
        classifier = %config.classifier_url,
        serialize_processing = config.serialize_processing,
        "Initializing aoi-sorter"
    );

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "aoi_images_discovered_total",
        "Images found by the backlog scan or the filesystem watch"
    );
    metrics::describe_counter!(
        "aoi_images_skipped_total",
        "Images skipped because a result document already existed"
    );
    metrics::describe_counter!(
        "aoi_images_classified_total",
        "Images classified and sorted"
    );
    metrics::describe_counter!(
        "aoi_images_failed_total",
        "Images abandoned after a read, classifier, response or write failure"
    );
    metrics::describe_counter!(
        "aoi_artifacts_written_total",
        "Result documents written, by category"
    );
    metrics::describe_histogram!(
        "aoi_classification_seconds",
        "Round trip time of one classification request"
    );

    tokio::fs::create_dir_all(&config.output_root)
        .await
        .expect("Failed to create output root");

    let status_addr = config.status_addr.clone();
    let state = AppState::from_config(config).expect("Failed to initialize classifier client");

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    if let Some(addr) = status_addr {
        let app = Router::new()
            .route("/health", get(routes::health::health_check))
            .with_state(state.clone())
            .route(
                "/metrics",
                get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
            )
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind status address");

        tracing::info!("Status server listening on {}", addr);

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Status server error");
            }
        });
    }

    let controller = IngestionController::new(state);
    match controller.run(shutdown).await {
        Ok(report) => tracing::info!(
            backlog_completed = report.completed,
            backlog_failed = report.failed,
            "aoi-sorter stopped"
        ),
        Err(e) => {
            tracing::error!(error = %e, "Ingestion failed to start");
            std::process::exit(1);
        }
    }
}

/// Cancel `shutdown` on Ctrl-C, or SIGTERM on Unix.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
