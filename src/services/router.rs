use crate::models::candidate::ImageCandidate;
use crate::models::classification::{Category, PredictEntry, PredictResponse, Prediction};
use crate::services::result_store::{ArtifactPaths, ResultStore};

/// Where one prediction entry for an image goes.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub category: Category,
    pub score: f64,
    pub paths: ArtifactPaths,
}

/// Parse a classifier response body into its prediction entries, in order.
///
/// Every entry must carry `meta.predicted_score`; one malformed entry
/// rejects the whole response so nothing is written for the image.
pub fn parse_predictions(body: &str) -> Result<Vec<Prediction>, RouteError> {
    let response: PredictResponse = serde_json::from_str(body).map_err(RouteError::Shape)?;

    let results = response.predict_result_data.predict_results;
    let mut predictions = Vec::with_capacity(results.len());
    for (index, raw) in results.iter().enumerate() {
        let entry: PredictEntry = serde_json::from_str(raw.get())
            .map_err(|source| RouteError::Entry { index, source })?;
        predictions.push(Prediction {
            score: entry.meta.predicted_score,
            raw: raw.get().to_string(),
        });
    }
    Ok(predictions)
}

/// Decide the category and output paths for each prediction.
pub fn plan_routes(
    store: &ResultStore,
    candidate: &ImageCandidate,
    predictions: &[Prediction],
) -> Vec<RouteDecision> {
    predictions
        .iter()
        .map(|prediction| {
            let category = prediction.category();
            RouteDecision {
                category,
                score: prediction.score,
                paths: store.artifact_paths(candidate, category),
            }
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Unexpected classifier response: {0}")]
    Shape(#[source] serde_json::Error),

    #[error("Prediction entry {index} has no usable score: {source}")]
    Entry {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
