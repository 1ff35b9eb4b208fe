#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use rigreg_linalg as linalg;

#[doc(inline)]
pub use rigreg_3d as k3d;

#[doc(inline)]
pub use rigreg_icp as icp;
