//! Selection state machine driving the boundary viewer.
//!
//! Two strategies share one [`Selection`] model and one [`UiEvent`] surface:
//! [`TiledSession`] toggles pre-built per-level tile layers, while
//! [`OnDemandSession`] aggregates a single level at a time from raw rows.

pub mod display;
pub mod error;
pub mod event;
pub mod on_demand;
pub mod selection;
pub mod tiled;
pub mod viewport;

pub use display::*;
pub use error::*;
pub use event::*;
pub use on_demand::*;
pub use selection::*;
pub use tiled::*;
pub use viewport::*;
