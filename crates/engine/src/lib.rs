pub mod aggregate;
pub mod decode;
pub mod dissolve;
pub mod engine;
pub mod error;
pub mod row;

pub use aggregate::*;
pub use decode::*;
pub use dissolve::*;
pub use engine::*;
pub use error::*;
pub use row::*;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
