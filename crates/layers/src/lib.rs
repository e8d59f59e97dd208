pub mod boundary;
pub mod data;
pub mod density;
pub mod labels;
pub mod layer;
pub mod loader;
pub mod points;
pub mod registry;
pub mod symbology;

pub use boundary::*;
pub use data::*;
pub use density::*;
pub use labels::*;
pub use layer::*;
pub use loader::*;
pub use points::*;
pub use registry::*;
pub use symbology::*;
