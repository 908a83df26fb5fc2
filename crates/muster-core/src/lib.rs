pub mod alert;
pub mod error;
pub mod event;
pub mod ids;
pub mod route;
