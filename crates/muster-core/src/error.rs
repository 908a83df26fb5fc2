use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("route requires a receiver")]
    RouteRequiresReceiver,
}
