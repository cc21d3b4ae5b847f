pub mod layer;
pub mod reconcile;
pub mod surface;
pub mod symbology;

pub use layer::*;
pub use reconcile::*;
pub use surface::*;
pub use symbology::*;
