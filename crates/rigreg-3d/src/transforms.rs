use glam::{DMat3, DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::linalg;

/// Tolerance used when checking that a matrix is a proper rigid transform.
const RIGIDITY_EPSILON: f64 = 1e-6;

/// Error type for transform construction and application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    /// The rotation axis has zero length.
    #[error("Cannot compute rotation matrix from a zero vector")]
    ZeroAxis,

    /// The 3x3 block is not orthonormal with determinant +1.
    #[error("Rotation block is not a proper rotation (det = {0})")]
    NotRigid(f64),

    /// The bottom row is not (0, 0, 0, 1).
    #[error("Bottom row of a homogeneous transform must be (0, 0, 0, 1)")]
    InvalidHomogeneousRow,

    /// The matrix holds NaN or infinite entries.
    #[error("Transform contains non-finite values")]
    NonFinite,

    /// Source and destination buffers differ in length.
    #[error("Point buffers have different lengths ({0} vs {1})")]
    LengthMismatch(usize, usize),
}

/// A rigid transformation in SE(3) stored as a 4x4 homogeneous matrix.
///
/// Maps points from the source frame into the reference frame:
/// `p_ref = R * p_src + t`. Serialized as four row-major rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct RigidTransform(DMat4);

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// Create an identity transformation (no rotation or translation).
    pub const fn identity() -> Self {
        Self(DMat4::IDENTITY)
    }

    /// Assemble a transform from a rotation block and a translation vector.
    ///
    /// PRECONDITION: `rotation` is orthonormal with determinant +1.
    pub fn from_rotation_translation(rotation: DMat3, translation: DVec3) -> Self {
        Self(DMat4::from_cols(
            rotation.x_axis.extend(0.0),
            rotation.y_axis.extend(0.0),
            rotation.z_axis.extend(0.0),
            translation.extend(1.0),
        ))
    }

    /// Create a transform from four row-major rows, checking it is rigid.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Result<Self, TransformError> {
        let m = DMat4::from_cols_array_2d(&rows).transpose();
        if !m.is_finite() {
            return Err(TransformError::NonFinite);
        }

        let bottom = m.row(3);
        if !bottom.abs_diff_eq(DVec4::W, RIGIDITY_EPSILON) {
            return Err(TransformError::InvalidHomogeneousRow);
        }

        let rotation = DMat3::from_mat4(m);
        let det = rotation.determinant();
        let orthonormal =
            (rotation.transpose() * rotation).abs_diff_eq(DMat3::IDENTITY, RIGIDITY_EPSILON);
        if !orthonormal || (det - 1.0).abs() > RIGIDITY_EPSILON {
            return Err(TransformError::NotRigid(det));
        }

        Ok(Self(m))
    }

    /// The transform as four row-major rows.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        self.0.transpose().to_cols_array_2d()
    }

    /// The underlying homogeneous matrix.
    #[inline]
    pub fn matrix(&self) -> &DMat4 {
        &self.0
    }

    /// The 3x3 rotation block.
    #[inline]
    pub fn rotation(&self) -> DMat3 {
        DMat3::from_mat4(self.0)
    }

    /// The translation vector.
    #[inline]
    pub fn translation(&self) -> DVec3 {
        self.0.w_axis.truncate()
    }

    /// Rotation angle in radians of the rotation block.
    pub fn rotation_angle(&self) -> f64 {
        let r = self.rotation();
        let cos = ((r.x_axis.x + r.y_axis.y + r.z_axis.z - 1.0) * 0.5).clamp(-1.0, 1.0);
        cos.acos()
    }

    /// Compose this transformation with another (`self * other`).
    ///
    /// The result applies `other` first and `self` last.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        Self(self.0 * other.0)
    }

    /// Get the inverse of this transformation.
    pub fn inverse(&self) -> RigidTransform {
        let rotation_inv = self.rotation().transpose();
        Self::from_rotation_translation(rotation_inv, -(rotation_inv * self.translation()))
    }

    /// Apply the transform to a single point.
    #[inline]
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        self.0.transform_point3(DVec3::from_array(*point)).to_array()
    }

    /// Apply the transform to a set of points, returning a new buffer.
    pub fn transform_points(&self, points: &[[f64; 3]]) -> Vec<[f64; 3]> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// Apply the transform to a set of points, writing into a pre-allocated buffer.
    pub fn transform_points_into(
        &self,
        src_points: &[[f64; 3]],
        dst_points: &mut [[f64; 3]],
    ) -> Result<(), TransformError> {
        linalg::transform_points(
            src_points,
            &self.rotation(),
            &self.translation(),
            dst_points,
        )
    }

    /// Compare two transforms entry by entry.
    pub fn abs_diff_eq(&self, other: &RigidTransform, max_abs_diff: f64) -> bool {
        self.0.abs_diff_eq(other.0, max_abs_diff)
    }
}

impl TryFrom<[[f64; 4]; 4]> for RigidTransform {
    type Error = TransformError;

    fn try_from(rows: [[f64; 4]; 4]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<RigidTransform> for [[f64; 4]; 4] {
    fn from(transform: RigidTransform) -> Self {
        transform.to_rows()
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. Normalized internally.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The rotation matrix.
///
/// Example:
///
/// ```
/// use rigreg_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 2.0], std::f64::consts::PI).unwrap();
/// assert!((rotation.x_axis.x + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(axis: &[f64; 3], angle: f64) -> Result<DMat3, TransformError> {
    let axis = DVec3::from_array(*axis);
    let magnitude = axis.length();
    if magnitude < 1e-10 || !magnitude.is_finite() {
        return Err(TransformError::ZeroAxis);
    }
    Ok(DMat3::from_axis_angle(axis / magnitude, angle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_transform() -> Result<RigidTransform, TransformError> {
        let rotation = axis_angle_to_rotation_matrix(&[1.0, 2.0, -0.5], 0.7)?;
        Ok(RigidTransform::from_rotation_translation(
            rotation,
            DVec3::new(0.5, -1.0, 2.0),
        ))
    }

    #[test]
    fn test_axis_angle_to_rotation_matrix() -> Result<(), TransformError> {
        let rotation = axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], std::f64::consts::PI / 2.0)?;
        // row-major [[1, 0, 0], [0, 0, -1], [0, 1, 0]]
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for (i, row) in expected.iter().enumerate() {
            for (j, e) in row.iter().enumerate() {
                assert_relative_eq!(rotation.col(j)[i], e, epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_axis_angle_zero_axis() {
        let res = axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0);
        assert_eq!(res, Err(TransformError::ZeroAxis));
    }

    #[test]
    fn test_rows_roundtrip() -> Result<(), TransformError> {
        let transform = test_transform()?;
        let rows = transform.to_rows();

        assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(rows[0][3], 0.5);
        assert_relative_eq!(rows[1][3], -1.0);
        assert_relative_eq!(rows[2][3], 2.0);

        let back = RigidTransform::from_rows(rows)?;
        assert!(back.abs_diff_eq(&transform, 1e-15));
        Ok(())
    }

    #[test]
    fn test_from_rows_rejects_reflection() {
        let rows = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(matches!(
            RigidTransform::from_rows(rows),
            Err(TransformError::NotRigid(_))
        ));
    }

    #[test]
    fn test_from_rows_rejects_scaling_and_projective_row() {
        let scaled = [
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.5, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(matches!(
            RigidTransform::from_rows(scaled),
            Err(TransformError::NotRigid(_))
        ));

        let projective = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.1, 1.0],
        ];
        assert_eq!(
            RigidTransform::from_rows(projective),
            Err(TransformError::InvalidHomogeneousRow)
        );
    }

    #[test]
    fn test_compose_applies_right_operand_first() -> Result<(), TransformError> {
        let rotate = RigidTransform::from_rotation_translation(
            axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2)?,
            DVec3::ZERO,
        );
        let shift = RigidTransform::from_rotation_translation(DMat3::IDENTITY, DVec3::X);

        // shift then rotate: (1, 0, 0) -> (2, 0, 0) -> (0, 2, 0)
        let p = rotate.compose(&shift).transform_point(&[1.0, 0.0, 0.0]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-12);

        let q = (rotate * shift).transform_point(&[1.0, 0.0, 0.0]);
        assert_eq!(p, q);
        Ok(())
    }

    #[test]
    fn test_inverse() -> Result<(), TransformError> {
        let transform = test_transform()?;
        let identity = transform.compose(&transform.inverse());
        assert!(identity.abs_diff_eq(&RigidTransform::identity(), 1e-12));

        let points = vec![[1.0, 2.0, 3.0], [-4.0, 0.5, 9.0]];
        let moved = transform.transform_points(&points);
        let back = transform.inverse().transform_points(&moved);
        for (res, exp) in back.iter().zip(points.iter()) {
            for (r, e) in res.iter().zip(exp.iter()) {
                assert_relative_eq!(r, e, epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_transform_points_into_matches_transform_points() -> Result<(), TransformError> {
        let transform = test_transform()?;
        let points = vec![[1.0, 2.0, 3.0], [-4.0, 0.5, 9.0]];
        let mut buffer = vec![[0.0; 3]; points.len()];
        transform.transform_points_into(&points, &mut buffer)?;

        for (res, exp) in buffer.iter().zip(transform.transform_points(&points).iter()) {
            for (r, e) in res.iter().zip(exp.iter()) {
                assert_relative_eq!(r, e, epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_rotation_angle() -> Result<(), TransformError> {
        let transform = test_transform()?;
        assert_relative_eq!(transform.rotation_angle(), 0.7, epsilon = 1e-9);
        assert_relative_eq!(RigidTransform::identity().rotation_angle(), 0.0);
        Ok(())
    }

    #[test]
    fn test_serde_rows() -> Result<(), Box<dyn std::error::Error>> {
        let transform = test_transform()?;
        let json = serde_json::to_string(&transform)?;
        let back: RigidTransform = serde_json::from_str(&json)?;
        assert!(back.abs_diff_eq(&transform, 1e-12));

        let bad = "[[2,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]";
        assert!(serde_json::from_str::<RigidTransform>(bad).is_err());
        Ok(())
    }
}
