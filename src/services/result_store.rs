use std::path::{Path, PathBuf};

use crate::models::candidate::ImageCandidate;
use crate::models::classification::Category;

/// Suffix appended to the image stem to name its result document.
pub const RESULT_SUFFIX: &str = "_result.json";

/// Activity log file name, directly under the output root.
pub const LOG_FILE_NAME: &str = "log.txt";

/// Output paths for one (image, category) artifact pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub image_copy: PathBuf,
    pub result_document: PathBuf,
}

/// The sorted output tree: `<root>/<date>/<serial>/<PASS|FAIL>/`.
///
/// A result document in either category is the only record that an image
/// was processed.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE_NAME)
    }

    pub fn category_dir(&self, candidate: &ImageCandidate, category: Category) -> PathBuf {
        self.root
            .join(&candidate.date)
            .join(&candidate.serial)
            .join(category.to_string())
    }

    pub fn artifact_paths(&self, candidate: &ImageCandidate, category: Category) -> ArtifactPaths {
        let dir = self.category_dir(candidate, category);
        ArtifactPaths {
            image_copy: dir.join(&candidate.file_name),
            result_document: dir.join(result_document_name(candidate)),
            dir,
        }
    }

    /// Whether a result document exists for the image under PASS or FAIL.
    ///
    /// A document that cannot be checked counts as absent, so the image is
    /// retried rather than silently dropped.
    pub async fn is_processed(&self, candidate: &ImageCandidate) -> bool {
        for category in Category::ALL {
            let document = self.artifact_paths(candidate, category).result_document;
            match tokio::fs::try_exists(&document).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        document = %document.display(),
                        error = %e,
                        "Failed to check for result document"
                    );
                }
            }
        }
        false
    }

    /// Copy the image into its category directory, then write the result
    /// document. The document goes last so its presence marks completion.
    pub async fn write_artifact(
        &self,
        candidate: &ImageCandidate,
        category: Category,
        raw_result: &str,
    ) -> Result<ArtifactPaths, StoreError> {
        let paths = self.artifact_paths(candidate, category);

        tokio::fs::create_dir_all(&paths.dir)
            .await
            .map_err(|e| StoreError::CreateDir(paths.dir.clone(), e))?;

        tokio::fs::copy(&candidate.source, &paths.image_copy)
            .await
            .map_err(|e| StoreError::CopyImage(paths.image_copy.clone(), e))?;

        tokio::fs::write(&paths.result_document, raw_result.as_bytes())
            .await
            .map_err(|e| StoreError::WriteResult(paths.result_document.clone(), e))?;

        Ok(paths)
    }
}

pub fn result_document_name(candidate: &ImageCandidate) -> String {
    format!("{}{}", candidate.stem(), RESULT_SUFFIX)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to create directory {0}: {1}")]
    CreateDir(PathBuf, #[source] std::io::Error),

    #[error("Failed to copy image to {0}: {1}")]
    CopyImage(PathBuf, #[source] std::io::Error),

    #[error("Failed to write result document {0}: {1}")]
    WriteResult(PathBuf, #[source] std::io::Error),
}
