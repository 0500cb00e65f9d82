//! Shared setup for pipeline tests: scratch input/output trees and a mock
//! classification service.

#![allow(dead_code)]

use aoi_sorter::{app_state::AppState, config::AppConfig, models::candidate::ImageCandidate};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

pub const CLASSIFY_PATH: &str = "/api_v1/vision_predictor/product_serial/component/classifier";

pub struct Station {
    pub input: TempDir,
    pub output: TempDir,
    pub server: MockServer,
}

impl Station {
    pub async fn start() -> Self {
        Self {
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
            server: MockServer::start().await,
        }
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::new(
            self.input.path(),
            self.output.path(),
            format!("{}{}", self.server.uri(), CLASSIFY_PATH),
        );
        config.stability_poll_ms = 50;
        config.shutdown_grace_secs = 5;
        config
    }

    pub fn state(&self) -> AppState {
        AppState::from_config(self.config()).unwrap()
    }

    /// Write `<input>/<date>/<serial>/<file>` and return its path.
    pub fn add_image(&self, date: &str, serial: &str, file: &str, bytes: &[u8]) -> PathBuf {
        let path = self.input.path().join(date).join(serial).join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn candidate(&self, path: &Path) -> ImageCandidate {
        ImageCandidate::from_watched_path(self.input.path(), path, "jpg").unwrap()
    }

    pub fn out(&self, relative: &str) -> PathBuf {
        self.output.path().join(relative)
    }

    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.output.path().join("log.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Classifier response body with one entry per score.
pub fn predictions(scores: &[f64]) -> serde_json::Value {
    let results: Vec<serde_json::Value> = scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            serde_json::json!({
                "meta": { "predicted_score": score, "defect_index": i },
                "class_name": if *score > 0.5 { "NG" } else { "OK" }
            })
        })
        .collect();

    serde_json::json!({ "predict_result_data": { "predict_results": results } })
}

/// Poll until `path` exists or `timeout` passes.
pub async fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    path.exists()
}
