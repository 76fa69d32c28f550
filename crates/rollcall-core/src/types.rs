use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{
    RollcallConfig, DEFAULT_DELIVERY_TIMEOUT_MS, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS,
};

/// One person's attendance for a day, as delivered by the live forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub school_id: String,
    pub school_domain: String,
    /// Join key for person-info lookups.
    pub person_code: String,
    pub attendance_date: Option<String>,
    pub full_name: Option<String>,
    pub phone_no: Option<String>,
    pub attendance_status: String,
}

/// Which job the scheduler drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Integration {
    AttendanceForwarder,
    CsvUploader,
}

impl Integration {
    /// Map a configured name to an integration. Missing or unknown names
    /// select the forwarder.
    pub fn normalize(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("csvUploader") => Integration::CsvUploader,
            _ => Integration::AttendanceForwarder,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Integration::AttendanceForwarder => "attendanceForwarder",
            Integration::CsvUploader => "csvUploader",
        }
    }

    /// Job label used in logs and schedule snapshots.
    pub fn label(&self) -> &'static str {
        match self {
            Integration::AttendanceForwarder => "Attendance forwarder",
            Integration::CsvUploader => "CSV data sender",
        }
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied values that win over the persisted configuration.
#[derive(Debug, Clone, Default)]
pub struct DeliveryOverrides {
    pub endpoint: Option<String>,
    pub directory: Option<PathBuf>,
    pub max_retries: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub school_id: Option<String>,
    pub school_domain: Option<String>,
}

/// Everything one job execution needs, resolved when the job fires.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOptions {
    pub endpoint: Option<String>,
    /// CSV export directory (CSV mode only).
    pub directory: Option<PathBuf>,
    /// Total attempts, always at least 1.
    pub max_retries: u32,
    /// Pause between attempts, always at least one second.
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub school_id: String,
    pub school_domain: String,
    pub retry_client_errors: bool,
}

impl DeliveryOptions {
    /// Merge `overrides` over `config`. Zero numeric values fall back to the
    /// defaults and blank strings count as unset.
    pub fn resolve(config: &RollcallConfig, overrides: &DeliveryOverrides) -> Self {
        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| Some(config.integration.endpoint.clone()))
            .and_then(non_blank);
        let directory = overrides.directory.clone().or_else(|| {
            non_blank(config.csv.upload_dir.clone()).map(PathBuf::from)
        });

        let max_retries = positive(
            overrides.max_retries.unwrap_or(config.delivery.max_retries),
            DEFAULT_MAX_RETRIES,
        );
        let retry_delay_secs = positive(
            overrides
                .retry_delay_seconds
                .unwrap_or(config.delivery.retry_delay_seconds),
            DEFAULT_RETRY_DELAY_SECS,
        );
        let timeout_ms = positive(
            overrides.timeout_ms.unwrap_or(config.delivery.timeout_ms),
            DEFAULT_DELIVERY_TIMEOUT_MS,
        );

        Self {
            endpoint,
            directory: directory.filter(|d| !d.as_os_str().is_empty()),
            max_retries,
            retry_delay: Duration::from_secs(retry_delay_secs),
            timeout: Duration::from_millis(timeout_ms),
            school_id: overrides
                .school_id
                .clone()
                .unwrap_or_else(|| config.school.id.clone()),
            school_domain: overrides
                .school_domain
                .clone()
                .unwrap_or_else(|| config.school.domain.clone()),
            retry_client_errors: config.delivery.retry_client_errors,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn positive<T: PartialEq + Default>(value: T, fallback: T) -> T {
    if value == T::default() {
        fallback
    } else {
        value
    }
}

/// Why a job execution ended without doing any work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EndpointMissing,
    DirectoryMissing,
    /// A previous execution of the same runner has not finished.
    AlreadyRunning,
    /// The export for `day` has not been produced yet.
    NoFileForDay { day: NaiveDate },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EndpointMissing => f.write_str("delivery endpoint is not configured"),
            SkipReason::DirectoryMissing => f.write_str("CSV directory is not configured"),
            SkipReason::AlreadyRunning => f.write_str("previous run is still in progress"),
            SkipReason::NoFileForDay { day } => write!(f, "no CSV file for {day}"),
        }
    }
}

/// Result of one job execution. Runners never return errors; the scheduler
/// only logs this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { summary: String },
    Skipped(SkipReason),
    Failed { error: String },
}

impl RunOutcome {
    pub fn failed(error: impl fmt::Display) -> Self {
        RunOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed { summary } => write!(f, "completed: {summary}"),
            RunOutcome::Skipped(reason) => write!(f, "skipped: {reason}"),
            RunOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}
