pub mod frame;
pub mod status;

pub use frame::*;
pub use status::*;
