//! AOI image sorter
//!
//! Watches an inspection station's image tree (`<date>/<serial>/<file>`),
//! submits each new image to a remote classification service and sorts the
//! image plus its result document into PASS/FAIL folders of an output tree.
//! The output tree is the only record of what has been processed.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
