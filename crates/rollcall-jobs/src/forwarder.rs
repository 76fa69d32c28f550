use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use rollcall_artemis::{fetch_attendance_for_day, ArtemisClient};
use rollcall_core::config::SchoolConfig;
use rollcall_core::{
    ConfigProvider, DeliveryOptions, DeliveryOverrides, RollcallConfig, RunOutcome, SingleFlight,
    SkipReason,
};
use rollcall_scheduler::JobRunner;
use rollcall_upload::{deliver, RetryPolicy};
use serde::Serialize;
use tracing::{error, info, warn};

/// Envelope fields sent with the forwarded records.
#[derive(Debug, Serialize)]
struct ForwardMetadata {
    success: bool,
    fetched_at: String,
}

/// Pulls today's attendance from the gateway and posts it to the collector.
pub struct AttendanceForwarder {
    config: Arc<dyn ConfigProvider>,
    overrides: DeliveryOverrides,
    day: Option<NaiveDate>,
    flight: SingleFlight,
    http: reqwest::Client,
}

impl AttendanceForwarder {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            config,
            overrides: DeliveryOverrides::default(),
            day: None,
            flight: SingleFlight::new(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: DeliveryOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Forward this day instead of today.
    pub fn with_day(mut self, day: Option<NaiveDate>) -> Self {
        self.day = day;
        self
    }

    async fn forward(
        &self,
        config: &RollcallConfig,
        options: &DeliveryOptions,
        endpoint: &str,
    ) -> RunOutcome {
        let client = match ArtemisClient::new(&config.vendor) {
            Ok(client) => client,
            Err(e) => return RunOutcome::failed(e),
        };
        let school = SchoolConfig {
            id: options.school_id.clone(),
            domain: options.school_domain.clone(),
        };
        let day = self.day.unwrap_or_else(|| Local::now().date_naive());

        let records = match fetch_attendance_for_day(&client, &school, day).await {
            Ok(records) => records,
            Err(e) => {
                warn!(%day, error = %e, "attendance fetch did not succeed");
                return RunOutcome::failed(e);
            }
        };

        let metadata = ForwardMetadata {
            success: true,
            fetched_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let policy = RetryPolicy::from_options(options);

        match deliver(&self.http, endpoint, &metadata, &records, &policy).await {
            Ok(delivered) => {
                info!(
                    endpoint,
                    status = delivered.status,
                    records = records.len(),
                    attempt = delivered.attempt,
                    "attendance payload forwarded"
                );
                RunOutcome::Completed {
                    summary: format!(
                        "forwarded {} record(s) for {day} (status {}, attempt {})",
                        records.len(),
                        delivered.status,
                        delivered.attempt
                    ),
                }
            }
            Err(e) => {
                error!(endpoint, attempts = e.attempts, error = %e.source, "attendance forward failed");
                RunOutcome::failed(e)
            }
        }
    }
}

#[async_trait]
impl JobRunner for AttendanceForwarder {
    async fn run(&self) -> RunOutcome {
        let config = match self.config.load() {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, code = e.code(), "attendance forwarder cannot read configuration");
                return RunOutcome::failed(e);
            }
        };
        let options = DeliveryOptions::resolve(&config, &self.overrides);
        let Some(endpoint) = options.endpoint.clone() else {
            error!("attendance forwarder skipped: endpoint not configured");
            return RunOutcome::Skipped(SkipReason::EndpointMissing);
        };

        let Some(_permit) = self.flight.try_acquire() else {
            warn!("attendance forward job skipped because previous invocation is still running");
            return RunOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        self.forward(&config, &options, &endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use rollcall_core::MemoryConfig;

    use super::*;

    #[tokio::test]
    async fn missing_endpoint_is_skipped() {
        let forwarder =
            AttendanceForwarder::new(Arc::new(MemoryConfig::new(RollcallConfig::default())));
        assert_eq!(
            forwarder.run().await,
            RunOutcome::Skipped(SkipReason::EndpointMissing)
        );
    }

    #[tokio::test]
    async fn busy_runner_skips() {
        let mut config = RollcallConfig::default();
        config.integration.endpoint = "http://127.0.0.1:9/ingest".to_string();
        let forwarder = AttendanceForwarder::new(Arc::new(MemoryConfig::new(config)));

        let _held = forwarder.flight.try_acquire().unwrap();
        assert_eq!(
            forwarder.run().await,
            RunOutcome::Skipped(SkipReason::AlreadyRunning)
        );
    }
}
