use std::path::PathBuf;

use chrono::NaiveDate;
use rollcall_core::DeliveryOptions;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::delivery::{deliver, RetryPolicy};
use crate::discovery::{absolute_dir, find_file_for_day};
use crate::error::{Result, UploadError};
use crate::parser::parse_csv_file;

/// Fields sent alongside the CSV rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvMetadata {
    /// Reference day, `YYYY-MM-DD`.
    pub date: String,
    pub school_id: String,
    pub school_domain: String,
}

/// What one successful upload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSendSummary {
    pub file_path: PathBuf,
    pub status: u16,
    pub record_count: usize,
    pub attempt: u32,
}

/// Find `day`'s export, parse it and deliver it with retries.
pub async fn send_daily_csv_data(options: &DeliveryOptions, day: NaiveDate) -> Result<CsvSendSummary> {
    let endpoint = options.endpoint.as_deref().ok_or_else(|| {
        error!("CSV endpoint is not configured");
        UploadError::EndpointMissing
    })?;
    let directory = options.directory.as_deref().ok_or_else(|| {
        error!("CSV directory is not configured");
        UploadError::DirectoryMissing
    })?;

    let Some(file) = find_file_for_day(directory, day).await? else {
        let directory = absolute_dir(directory);
        warn!(directory = %directory.display(), %day, "CSV file not found for the configured day");
        return Err(UploadError::FileNotFound { directory, day });
    };

    let rows = match parse_csv_file(&file).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(file = %file.display(), error = %e, "CSV parse failed");
            return Err(e);
        }
    };
    info!(file = %file.display(), records = rows.len(), "CSV file parsed successfully");

    let metadata = CsvMetadata {
        date: day.format("%Y-%m-%d").to_string(),
        school_id: options.school_id.clone(),
        school_domain: options.school_domain.clone(),
    };
    let client = reqwest::Client::builder().timeout(options.timeout).build()?;

    match deliver(&client, endpoint, &metadata, &rows, &RetryPolicy::from_options(options)).await {
        Ok(delivered) => {
            info!(
                file = %file.display(),
                endpoint,
                status = delivered.status,
                records = rows.len(),
                attempt = delivered.attempt,
                "CSV data sent"
            );
            Ok(CsvSendSummary {
                file_path: file,
                status: delivered.status,
                record_count: rows.len(),
                attempt: delivered.attempt,
            })
        }
        Err(e) => {
            error!(file = %file.display(), endpoint, attempts = e.attempts, error = %e.source, "CSV send failed");
            Err(UploadError::SendFailed {
                path: file,
                attempts: e.attempts,
                source: e.source,
            })
        }
    }
}
