use thiserror::Error;

/// Reasons the scheduler refuses to start.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Neither run times nor a cron expression are configured.
    #[error("No schedule configured: set daily run times or a cron expression")]
    NotConfigured,

    #[error("Configuration unavailable: {0}")]
    Config(#[from] rollcall_core::RollcallError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
