pub mod graph;
pub mod object;
pub mod owned;
pub mod sink;

pub use graph::*;
pub use object::*;
pub use owned::*;
pub use sink::*;
