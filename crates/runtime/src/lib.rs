pub mod event_bus;
pub mod readiness;

pub use event_bus::*;
pub use readiness::*;
