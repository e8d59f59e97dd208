pub mod feature;
pub mod predicate;

pub use feature::*;
pub use predicate::*;
