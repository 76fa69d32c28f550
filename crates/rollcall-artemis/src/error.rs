use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtemisError {
    /// An endpoint key outside the fixed table. This is a caller defect and
    /// the only failure the client does not fold into an [`ApiResponse`](crate::ApiResponse).
    #[error("Invalid API endpoint key: {0}")]
    UnknownEndpoint(String),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

/// Why an attendance report produced no records.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("attendance report request failed with status {status}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },

    #[error("attendance report response is malformed: {0}")]
    Malformed(String),

    #[error("cannot express local day {0} in UTC")]
    InvalidDay(chrono::NaiveDate),
}
