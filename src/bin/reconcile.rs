use aoi_sorter::{app_state::AppState, config::AppConfig, services::ingest::IngestionController};
use tracing_subscriber::EnvFilter;

/// One-shot backlog pass: sort every unprocessed image already on disk, then exit.
#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting one-shot backlog reconciliation");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    if !config.watch_root.is_dir() {
        tracing::error!(root = %config.watch_root.display(), "Watch root is not a directory");
        std::process::exit(2);
    }

    let state = AppState::from_config(config).expect("Failed to initialize classifier client");
    let controller = IngestionController::new(state);

    let report = controller.reconcile_backlog().await;

    tracing::info!(
        discovered = report.discovered,
        skipped = report.skipped,
        completed = report.completed,
        failed = report.failed,
        "Reconciliation finished"
    );

    if report.failed > 0 {
        std::process::exit(1);
    }
}
