use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use strum::{Display, EnumString};

/// Score above which a prediction entry is routed to FAIL.
pub const FAIL_THRESHOLD: f64 = 0.5;

/// Station metadata sent with every classification request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputMeta {
    pub vendor_name: String,
    pub aoi_hardware_version: String,
    pub aoi_hardware_config: String,
    pub aoi_software_version: String,
    pub aoi_software_config: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMeta {
    pub filename: String,
    pub filetype: String,
    /// Unix seconds at submission time.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputFile {
    #[serde(rename = "type")]
    pub kind: String,
    pub meta: FileMeta,
    /// Base64-encoded file bytes.
    pub content: String,
}

/// Single-image request body for the classification service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationRequest {
    pub input_meta: InputMeta,
    pub input_data: Vec<InputFile>,
}

impl ClassificationRequest {
    pub fn single_file(
        input_meta: InputMeta,
        filename: &str,
        filetype: &str,
        content_base64: String,
        timestamp: i64,
    ) -> Self {
        Self {
            input_meta,
            input_data: vec![InputFile {
                kind: "file_base64".to_string(),
                meta: FileMeta {
                    filename: filename.to_string(),
                    filetype: filetype.to_string(),
                    timestamp,
                },
                content: content_base64,
            }],
        }
    }
}

/// Routing destination for one prediction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Category {
    Pass,
    Fail,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Pass, Category::Fail];

    /// `score > 0.5` fails; everything else, including exactly 0.5, passes.
    pub fn from_score(score: f64) -> Self {
        if score > FAIL_THRESHOLD {
            Category::Fail
        } else {
            Category::Pass
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    pub predict_result_data: PredictResultData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResultData {
    pub predict_results: Vec<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictEntry {
    pub meta: PredictMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictMeta {
    pub predicted_score: f64,
}

/// One prediction entry: its score plus the entry's original JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub score: f64,
    pub raw: String,
}

impl Prediction {
    pub fn category(&self) -> Category {
        Category::from_score(self.score)
    }
}
