pub mod dispatch;
pub mod error;
pub mod event_service;
pub mod overview;
pub mod router;
