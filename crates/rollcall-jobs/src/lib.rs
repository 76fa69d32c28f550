//! `rollcall-jobs`: the two scheduled jobs and the activator that picks
//! between them.
//!
//! - [`AttendanceForwarder`] pulls the day's report from the Artemis gateway
//!   and posts `{success, fetched_at, data}` to the collector.
//! - [`CsvUploader`] ships the day's CSV export.
//! - [`IntegrationManager`] schedules whichever one the configuration names.

pub mod csv_upload;
pub mod forwarder;
pub mod integration;

pub use csv_upload::CsvUploader;
pub use forwarder::AttendanceForwarder;
pub use integration::IntegrationManager;
