#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Registration parameters.
pub mod config;

/// Nearest neighbour correspondence search.
pub mod correspondences;

/// Error types for the icp module.
pub mod error;

/// Iterative Closest Point driver.
pub mod icp;

/// Closed-form rigid pose estimation.
pub mod pose;

pub use config::IcpConfig;
pub use correspondences::{find_correspondences, Match, ReferenceIndex};
pub use error::IcpError;
pub use icp::{register, IcpIteration, IcpRegistration, IcpResult, IcpStatus};
pub use pose::{fit_transformation, solve, Correspondence, PoseSolver};
