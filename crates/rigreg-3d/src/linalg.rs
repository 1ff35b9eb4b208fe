use glam::{DMat3, DVec3};

use crate::transforms::TransformError;

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated slice to store the transformed points.
///
/// PRECONDITION: dst_points has the same length as src_points.
///
/// Example:
///
/// ```
/// use glam::{DMat3, DVec3};
/// use rigreg_3d::linalg::transform_points;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points(&src_points, &DMat3::IDENTITY, &DVec3::ZERO, &mut dst_points).unwrap();
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points(
    src_points: &[[f64; 3]],
    dst_r_src: &DMat3,
    dst_t_src: &DVec3,
    dst_points: &mut [[f64; 3]],
) -> Result<(), TransformError> {
    if src_points.len() != dst_points.len() {
        return Err(TransformError::LengthMismatch(
            src_points.len(),
            dst_points.len(),
        ));
    }

    for (p_dst, p_src) in dst_points.iter_mut().zip(src_points.iter()) {
        *p_dst = (*dst_r_src * DVec3::from_array(*p_src) + *dst_t_src).to_array();
    }

    Ok(())
}
