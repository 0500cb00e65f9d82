use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::services::{
    activity_log::ActivityLog,
    classifier::{ClassifierClient, ClassifierError},
    in_flight::InFlight,
    result_store::ResultStore,
    stability::StabilityGate,
};

/// Shared pipeline state handed to every processing unit and route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ResultStore>,
    pub classifier: Arc<ClassifierClient>,
    pub stability: Arc<StabilityGate>,
    pub activity_log: Arc<ActivityLog>,
    pub in_flight: Arc<InFlight>,
    /// Held around classify-and-route when processing is serialized.
    pub critical_section: Option<Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(config: AppConfig, classifier: ClassifierClient) -> Self {
        let store = ResultStore::new(&config.output_root);
        let activity_log = ActivityLog::new(store.log_path());
        let stability =
            StabilityGate::new(config.stability_poll_interval(), config.stability_max_wait());
        let critical_section = config
            .serialize_processing
            .then(|| Arc::new(Mutex::new(())));

        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            classifier: Arc::new(classifier),
            stability: Arc::new(stability),
            activity_log: Arc::new(activity_log),
            in_flight: InFlight::new(),
            critical_section,
        }
    }

    /// Build the classifier client from the config, then the state.
    pub fn from_config(config: AppConfig) -> Result<Self, ClassifierError> {
        let classifier =
            ClassifierClient::new(&config.classifier_url, config.input_meta(), config.extension())?;
        Ok(Self::new(config, classifier))
    }
}
