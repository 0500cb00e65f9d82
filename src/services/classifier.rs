use base64::Engine;
use reqwest::Client;

use crate::models::classification::{ClassificationRequest, InputMeta};

/// Client for the remote image classification endpoint.
pub struct ClassifierClient {
    http: Client,
    endpoint: String,
    input_meta: InputMeta,
    file_type: String,
}

impl ClassifierClient {
    pub fn new(
        endpoint: &str,
        input_meta: InputMeta,
        file_type: &str,
    ) -> Result<Self, ClassifierError> {
        let http = Client::builder()
            .user_agent(concat!("aoi-sorter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClassifierError::Http)?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            input_meta,
            file_type: file_type.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the single-image request body, stamped with the current time.
    pub fn build_request(&self, filename: &str, image_bytes: &[u8]) -> ClassificationRequest {
        ClassificationRequest::single_file(
            self.input_meta.clone(),
            filename,
            &self.file_type,
            base64::engine::general_purpose::STANDARD.encode(image_bytes),
            chrono::Utc::now().timestamp(),
        )
    }

    /// Submit one image and return the raw response body.
    ///
    /// A single attempt; any non-2xx status is an error.
    pub async fn classify(
        &self,
        filename: &str,
        image_bytes: &[u8],
    ) -> Result<String, ClassifierError> {
        let request_body = self.build_request(filename, image_bytes);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await
            .map_err(ClassifierError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(ClassifierError::Http)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> InputMeta {
        InputMeta {
            vendor_name: "Dinnar".to_string(),
            aoi_hardware_version: "0.1.1".to_string(),
            aoi_hardware_config: "ClarkeChan".to_string(),
            aoi_software_version: "0.2.1".to_string(),
            aoi_software_config: "ClarkeChan".to_string(),
        }
    }

    #[test]
    fn test_build_request_encodes_image() {
        let client =
            ClassifierClient::new("http://localhost:8889/classify", meta(), "jpg").unwrap();
        let before = chrono::Utc::now().timestamp();
        let request = client.build_request("img1.jpg", &[0xFF, 0xD8, 0xFF]);
        let after = chrono::Utc::now().timestamp();

        assert_eq!(request.input_meta, meta());
        assert_eq!(request.input_data.len(), 1);

        let file = &request.input_data[0];
        assert_eq!(file.kind, "file_base64");
        assert_eq!(file.meta.filename, "img1.jpg");
        assert_eq!(file.meta.filetype, "jpg");
        assert_eq!(file.content, "/9j/");
        assert!(file.meta.timestamp >= before && file.meta.timestamp <= after);
    }
}
