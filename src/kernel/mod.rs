//! Kernel functions and kernel-backed sample sets

pub mod feature_space;
pub mod linear;
pub mod precomputed;
pub mod traits;

pub use self::feature_space::*;
pub use self::linear::*;
pub use self::precomputed::*;
pub use self::traits::*;
