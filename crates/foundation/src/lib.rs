pub mod bounds;
pub mod generation;
pub mod level;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use generation::*;
pub use level::*;
