pub mod great_circle;
pub mod sphere;
pub mod vec;

pub use great_circle::*;
pub use sphere::*;
pub use vec::*;
