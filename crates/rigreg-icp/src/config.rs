use rigreg_3d::RigidTransform;
use serde::{Deserialize, Serialize};

use crate::error::IcpError;

/// Parameters of an ICP registration.
///
/// Every field has a default, so a partial JSON object deserializes into a
/// complete configuration:
///
/// ```
/// use rigreg_icp::IcpConfig;
///
/// let config: IcpConfig = serde_json::from_str(r#"{ "max_iterations": 10 }"#).unwrap();
/// assert_eq!(config.max_iterations, 10);
/// assert_eq!(config.convergence_tolerance, 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in RMSE between two consecutive iterations.
    pub convergence_tolerance: f64,
    /// Stop as soon as the RMSE drops to this value or below.
    pub absolute_residual_threshold: f64,
    /// Discard correspondences whose distance exceeds this value.
    pub correspondence_rejection_distance: Option<f64>,
    /// Discard correspondences farther than median + 3 sigma, with sigma
    /// estimated from the median absolute deviation of the distances.
    pub robust_rejection: bool,
    /// Transform applied to the source before the first iteration.
    pub initial_transform: RigidTransform,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_tolerance: 1e-6,
            absolute_residual_threshold: 1e-9,
            correspondence_rejection_distance: None,
            robust_rejection: false,
            initial_transform: RigidTransform::identity(),
        }
    }
}

impl IcpConfig {
    /// Check that the parameters describe a runnable registration.
    pub fn validate(&self) -> Result<(), IcpError> {
        if self.max_iterations == 0 {
            return Err(IcpError::InvalidInput(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance < 0.0 {
            return Err(IcpError::InvalidInput(format!(
                "convergence_tolerance must be finite and non-negative, got {}",
                self.convergence_tolerance
            )));
        }
        if !self.absolute_residual_threshold.is_finite() || self.absolute_residual_threshold < 0.0
        {
            return Err(IcpError::InvalidInput(format!(
                "absolute_residual_threshold must be finite and non-negative, got {}",
                self.absolute_residual_threshold
            )));
        }
        if let Some(distance) = self.correspondence_rejection_distance {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(IcpError::InvalidInput(format!(
                    "correspondence_rejection_distance must be finite and positive, got {distance}"
                )));
            }
        }
        Ok(())
    }
}
