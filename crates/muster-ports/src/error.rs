use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("not found")]
    NotFound,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification cancelled")]
    Cancelled,
    #[error("invalid target")]
    InvalidTarget,
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
