//! Core types and traits for nested cross-validation

pub mod error;
pub mod matrix;
pub mod traits;
pub mod types;

pub use self::error::*;
pub use self::matrix::*;
pub use self::traits::*;
pub use self::types::*;
