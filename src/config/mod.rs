use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::classification::InputMeta;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root of the inspection image tree (`<date>/<serial>/<file>`).
    pub watch_root: PathBuf,

    /// Root of the sorted output tree; also holds `log.txt`.
    pub output_root: PathBuf,

    /// Classification endpoint receiving one POST per image.
    pub classifier_url: String,

    /// Accepted image file extension, without the dot.
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,

    #[serde(default = "default_hardware_version")]
    pub aoi_hardware_version: String,

    #[serde(default = "default_station_config")]
    pub aoi_hardware_config: String,

    #[serde(default = "default_software_version")]
    pub aoi_software_version: String,

    #[serde(default = "default_station_config")]
    pub aoi_software_config: String,

    /// Delay between exclusive-open attempts on a file still being written.
    #[serde(default = "default_stability_poll_ms")]
    pub stability_poll_ms: u64,

    /// Give up on a file that stays locked this long. Unset waits forever.
    #[serde(default)]
    pub stability_max_wait_secs: Option<u64>,

    /// Hold one global lock around each image's classify-and-route work.
    #[serde(default = "default_serialize_processing")]
    pub serialize_processing: bool,

    /// Status server bind address (e.g., "127.0.0.1:9898"). Disabled when unset.
    #[serde(default)]
    pub status_addr: Option<String>,

    /// How long shutdown waits for in-flight images.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_image_extension() -> String {
    "jpg".to_string()
}

fn default_vendor_name() -> String {
    "Dinnar".to_string()
}

fn default_hardware_version() -> String {
    "0.1.1".to_string()
}

fn default_software_version() -> String {
    "0.2.1".to_string()
}

fn default_station_config() -> String {
    "ClarkeChan".to_string()
}

fn default_stability_poll_ms() -> u64 {
    500
}

fn default_serialize_processing() -> bool {
    true
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Configuration with every optional setting at its default.
    pub fn new(
        watch_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        classifier_url: impl Into<String>,
    ) -> Self {
        Self {
            watch_root: watch_root.into(),
            output_root: output_root.into(),
            classifier_url: classifier_url.into(),
            image_extension: default_image_extension(),
            vendor_name: default_vendor_name(),
            aoi_hardware_version: default_hardware_version(),
            aoi_hardware_config: default_station_config(),
            aoi_software_version: default_software_version(),
            aoi_software_config: default_station_config(),
            stability_poll_ms: default_stability_poll_ms(),
            stability_max_wait_secs: None,
            serialize_processing: default_serialize_processing(),
            status_addr: None,
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }

    /// Configured extension with any leading dot removed.
    pub fn extension(&self) -> &str {
        self.image_extension.trim_start_matches('.')
    }

    pub fn input_meta(&self) -> InputMeta {
        InputMeta {
            vendor_name: self.vendor_name.clone(),
            aoi_hardware_version: self.aoi_hardware_version.clone(),
            aoi_hardware_config: self.aoi_hardware_config.clone(),
            aoi_software_version: self.aoi_software_version.clone(),
            aoi_software_config: self.aoi_software_config.clone(),
        }
    }

    pub fn stability_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stability_poll_ms)
    }

    pub fn stability_max_wait(&self) -> Option<Duration> {
        self.stability_max_wait_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_station() {
        let config = AppConfig::new("/in", "/out", "http://localhost:8889/classify");
        assert_eq!(config.extension(), "jpg");
        assert_eq!(config.stability_poll_interval(), Duration::from_millis(500));
        assert!(config.stability_max_wait().is_none());
        assert!(config.serialize_processing);

        let meta = config.input_meta();
        assert_eq!(meta.vendor_name, "Dinnar");
        assert_eq!(meta.aoi_hardware_version, "0.1.1");
        assert_eq!(meta.aoi_software_config, "ClarkeChan");
    }

    #[test]
    fn test_extension_strips_leading_dot() {
        let mut config = AppConfig::new("/in", "/out", "http://localhost");
        config.image_extension = ".png".to_string();
        assert_eq!(config.extension(), "png");
    }

    #[test]
    fn test_from_iter_applies_defaults() {
        let vars = vec![
            ("WATCH_ROOT".to_string(), "/data/in".to_string()),
            ("OUTPUT_ROOT".to_string(), "/data/out".to_string()),
            ("CLASSIFIER_URL".to_string(), "http://10.0.0.5:8889/api".to_string()),
            ("STABILITY_MAX_WAIT_SECS".to_string(), "30".to_string()),
            ("SERIALIZE_PROCESSING".to_string(), "false".to_string()),
        ];
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.watch_root, PathBuf::from("/data/in"));
        assert_eq!(config.image_extension, "jpg");
        assert_eq!(config.stability_max_wait(), Some(Duration::from_secs(30)));
        assert!(!config.serialize_processing);
        assert!(config.status_addr.is_none());
    }
}
