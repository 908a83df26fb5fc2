pub mod memory;
pub mod notify;
pub mod persistence;
