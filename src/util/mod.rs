//! Utility types and functions for the results database.
//!
//! This module contains fundamental types used throughout the library:
//! - [`DataType`] - Element type tag of a stored variable
//! - [`Pool`] / [`Handle`] / [`Interner`] - Slab storage and content interning
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam

mod data_type;
mod error;
mod math;
mod pool;

pub use data_type::*;
pub use error::*;
pub use math::*;
pub use pool::*;
