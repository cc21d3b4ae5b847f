pub mod aggregation;
pub mod key;

pub use aggregation::*;
pub use key::*;
