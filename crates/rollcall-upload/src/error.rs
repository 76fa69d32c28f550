use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// One failed delivery attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector answered with status {status}")]
    Status { status: u16 },
}

impl AttemptError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, AttemptError::Status { status } if (400..500).contains(status))
    }
}

/// Delivery gave up after `attempts` tries.
#[derive(Debug, Error)]
#[error("delivery failed after {attempts} attempt(s): {source}")]
pub struct DeliveryError {
    pub attempts: u32,
    #[source]
    pub source: AttemptError,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("CSV endpoint is not configured")]
    EndpointMissing,

    #[error("CSV directory is not configured")]
    DirectoryMissing,

    #[error("CSV file not found for {day} in {}", directory.display())]
    FileNotFound { directory: PathBuf, day: NaiveDate },

    #[error("unable to read CSV directory {}: {source}", directory.display())]
    DirectoryAccess {
        directory: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV file {}: {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to send CSV data from {} after {attempts} attempt(s): {source}", path.display())]
    SendFailed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: AttemptError,
    },

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

impl UploadError {
    /// Short error code used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::EndpointMissing => "CSV_ENDPOINT_MISSING",
            UploadError::DirectoryMissing => "CSV_DIRECTORY_MISSING",
            UploadError::FileNotFound { .. } => "CSV_FILE_NOT_FOUND",
            UploadError::DirectoryAccess { .. } => "CSV_DIRECTORY_ACCESS",
            UploadError::ParseFailed { .. } => "CSV_PARSE_FAILED",
            UploadError::SendFailed { .. } => "CSV_SEND_FAILED",
            UploadError::Client(_) => "HTTP_CLIENT",
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
