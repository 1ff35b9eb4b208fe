use rigreg_3d::TransformError;
use rigreg_linalg::LinalgError;

/// Error type for pose estimation and ICP registration.
#[derive(Debug, thiserror::Error)]
pub enum IcpError {
    /// The inputs are malformed: empty correspondences, out of range indices,
    /// mismatched sizes, non-finite coordinates or an invalid configuration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough well-spread correspondences to estimate a rigid transform.
    #[error("Degenerate configuration: {0}")]
    DegenerateConfiguration(String),

    /// The SVD backend failed.
    #[error(transparent)]
    Linalg(#[from] LinalgError),

    /// A transform could not be built or applied.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl IcpError {
    /// Whether the error was caused by malformed inputs.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, IcpError::InvalidInput(_))
    }

    /// Whether the error was caused by a degenerate point configuration.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, IcpError::DegenerateConfiguration(_))
    }
}
