//! SVM solver implementations
//!
//! The dual problem is solved with Sequential Minimal Optimization (SMO)
//! over a precomputed kernel; probabilities come from Platt scaling.

pub mod platt;
pub mod smo;

pub use self::platt::*;
pub use self::smo::*;
