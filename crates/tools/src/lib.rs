//! Offline data preparation: catalog generation and per-level export.

pub mod export;
pub mod scan;

pub use export::*;
pub use scan::*;

/// Default simplification tolerance in degrees (about 100 m at the equator).
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.001;
