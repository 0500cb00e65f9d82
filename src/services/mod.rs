pub mod activity_log;
pub mod classifier;
pub mod in_flight;
pub mod ingest;
pub mod processor;
pub mod result_store;
pub mod router;
pub mod stability;
