pub mod source;
pub mod tiles;

pub use source::*;
pub use tiles::*;
