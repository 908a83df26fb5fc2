mod alerts;
mod marker;

pub use alerts::MemAlerts;
pub use marker::MemMarker;
