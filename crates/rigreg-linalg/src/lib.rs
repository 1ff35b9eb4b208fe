#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Module to calculate SVD of a 3x3 matrix
pub mod svd;

pub use svd::{JacobiSvd, LinalgError, NalgebraSvd, Svd3, SVD3Set};
