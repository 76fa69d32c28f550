use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rollcall_core::{
    ConfigProvider, DeliveryOptions, DeliveryOverrides, RunOutcome, SingleFlight, SkipReason,
};
use rollcall_scheduler::JobRunner;
use rollcall_upload::{send_daily_csv_data, UploadError};
use tracing::{error, warn};

/// Uploads the day's CSV export from the configured directory.
pub struct CsvUploader {
    config: Arc<dyn ConfigProvider>,
    overrides: DeliveryOverrides,
    day: Option<NaiveDate>,
    flight: SingleFlight,
}

impl CsvUploader {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            config,
            overrides: DeliveryOverrides::default(),
            day: None,
            flight: SingleFlight::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: DeliveryOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Upload this day's export instead of today's.
    pub fn with_day(mut self, day: Option<NaiveDate>) -> Self {
        self.day = day;
        self
    }
}

#[async_trait]
impl JobRunner for CsvUploader {
    async fn run(&self) -> RunOutcome {
        let options = match self.config.load() {
            Ok(config) => DeliveryOptions::resolve(&config, &self.overrides),
            Err(e) => {
                error!(error = %e, code = e.code(), "CSV send job cannot read configuration");
                return RunOutcome::failed(e);
            }
        };
        if options.endpoint.is_none() {
            error!("CSV data send skipped because endpoint is missing in configuration");
            return RunOutcome::Skipped(SkipReason::EndpointMissing);
        }
        if options.directory.is_none() {
            error!("CSV data send skipped because directory is missing in configuration");
            return RunOutcome::Skipped(SkipReason::DirectoryMissing);
        }

        let Some(_permit) = self.flight.try_acquire() else {
            warn!("CSV send job skipped because the previous run is still in progress");
            return RunOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        let day = self.day.unwrap_or_else(|| Local::now().date_naive());
        match send_daily_csv_data(&options, day).await {
            Ok(summary) => RunOutcome::Completed {
                summary: format!(
                    "sent {} record(s) from {} (status {}, attempt {})",
                    summary.record_count,
                    summary.file_path.display(),
                    summary.status,
                    summary.attempt
                ),
            },
            Err(UploadError::FileNotFound { day, .. }) => {
                RunOutcome::Skipped(SkipReason::NoFileForDay { day })
            }
            Err(UploadError::EndpointMissing) => RunOutcome::Skipped(SkipReason::EndpointMissing),
            Err(UploadError::DirectoryMissing) => RunOutcome::Skipped(SkipReason::DirectoryMissing),
            Err(e) => {
                error!(error = %e, code = e.code(), "CSV send job failed");
                RunOutcome::failed(e)
            }
        }
    }
}
