use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollcallError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RollcallError {
    /// Short error code used in structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            RollcallError::Config(_) => "CONFIG_ERROR",
            RollcallError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RollcallError>;
