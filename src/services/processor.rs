//! Per-image processing unit: idempotency check, stability wait, remote
//! classification and routing into the result store.
//!
//! Failures stop at the image: they are written to the activity log and
//! reported as [`ProcessOutcome::Failed`], never propagated.

use std::time::Instant;

use crate::app_state::AppState;
use crate::models::candidate::ImageCandidate;
use crate::services::activity_log::{
    failure_message, routed_message, skipped_message, start_message, success_message,
};
use crate::services::classifier::ClassifierError;
use crate::services::result_store::StoreError;
use crate::services::router::{self, RouteDecision, RouteError};
use crate::services::stability::StabilityError;

#[derive(Debug)]
pub enum ProcessOutcome {
    /// A result document already existed; the classifier was not called.
    AlreadyProcessed,
    /// Another unit currently owns this image.
    InFlight,
    Completed { routes: Vec<RouteDecision> },
    Failed,
}

/// Process one candidate end to end.
pub async fn process_image(state: &AppState, candidate: &ImageCandidate) -> ProcessOutcome {
    let path = candidate.source.as_path();

    if state.store.is_processed(candidate).await {
        tracing::debug!(path = %path.display(), "Result exists, skipping");
        metrics::counter!("aoi_images_skipped_total").increment(1);
        return ProcessOutcome::AlreadyProcessed;
    }

    let Some(_claim) = state.in_flight.try_claim(path) else {
        tracing::debug!(path = %path.display(), "Image already in flight");
        return ProcessOutcome::InFlight;
    };

    tracing::info!(
        path = %path.display(),
        date = %candidate.date,
        serial = %candidate.serial,
        "Processing image"
    );
    state.activity_log.record(&start_message(path)).await;

    match classify_and_route(state, candidate).await {
        Ok(Some(routes)) => {
            metrics::counter!("aoi_images_classified_total").increment(1);
            tracing::info!(
                path = %path.display(),
                results = routes.len(),
                "Image sorted"
            );
            ProcessOutcome::Completed { routes }
        }
        Ok(None) => {
            metrics::counter!("aoi_images_skipped_total").increment(1);
            state.activity_log.record(&skipped_message(path)).await;
            ProcessOutcome::AlreadyProcessed
        }
        Err(e) => {
            metrics::counter!("aoi_images_failed_total").increment(1);
            tracing::error!(path = %path.display(), error = %e, "Image processing failed");
            state.activity_log.record(&failure_message(path, &e)).await;
            ProcessOutcome::Failed
        }
    }
}

/// Returns `Ok(None)` when another unit finished the image while this one
/// waited.
async fn classify_and_route(
    state: &AppState,
    candidate: &ImageCandidate,
) -> Result<Option<Vec<RouteDecision>>, ProcessError> {
    let path = candidate.source.as_path();

    state.stability.wait_until_stable(path).await?;

    let _critical = match &state.critical_section {
        Some(lock) => Some(lock.lock().await),
        None => None,
    };

    if state.store.is_processed(candidate).await {
        return Ok(None);
    }

    let image_bytes = tokio::fs::read(path).await.map_err(ProcessError::Read)?;

    let start = Instant::now();
    let body = state
        .classifier
        .classify(&candidate.file_name, &image_bytes)
        .await?;
    metrics::histogram!("aoi_classification_seconds").record(start.elapsed().as_secs_f64());
    tracing::debug!(
        path = %path.display(),
        bytes = image_bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Classifier responded"
    );
    state.activity_log.record(&success_message(path)).await;

    let predictions = router::parse_predictions(&body)?;
    if predictions.is_empty() {
        tracing::warn!(path = %path.display(), "Classifier returned no predictions");
    }

    let routes = router::plan_routes(&state.store, candidate, &predictions);
    for (route, prediction) in routes.iter().zip(&predictions) {
        state
            .store
            .write_artifact(candidate, route.category, &prediction.raw)
            .await?;

        let category = route.category.to_string();
        metrics::counter!("aoi_artifacts_written_total", "category" => category.clone())
            .increment(1);
        tracing::info!(
            path = %path.display(),
            score = route.score,
            category = %category,
            "Prediction routed"
        );
        state
            .activity_log
            .record(&routed_message(path, &category, &route.paths.result_document))
            .await;
    }

    Ok(Some(routes))
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Stability(#[from] StabilityError),

    #[error("Failed to read image: {0}")]
    Read(#[source] std::io::Error),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Response(#[from] RouteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
