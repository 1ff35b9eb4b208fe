use glam::{DMat3, DVec3};
use rayon::prelude::*;
use rigreg_3d::{PointCloud, RigidTransform};
use rigreg_linalg::{NalgebraSvd, Svd3};

use crate::error::IcpError;

/// Minimum number of correspondences needed to pin down a 3D rigid transform.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Second singular value of the cross-covariance, relative to the first,
/// below which the point sets are treated as collinear. Both SVD backends
/// resolve singular vectors reliably above this ratio.
const RANK_RATIO: f64 = 1e-6;

/// Number of pairs above which the cross-covariance is accumulated in parallel.
const PARALLEL_THRESHOLD: usize = 4096;

/// A pairing of a reference point with a source point assumed to observe the
/// same physical location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Correspondence {
    /// Index into the reference cloud.
    pub reference: usize,
    /// Index into the source cloud.
    pub source: usize,
}

impl Correspondence {
    /// Create a new correspondence.
    pub fn new(reference: usize, source: usize) -> Self {
        Self { reference, source }
    }

    /// Pair every point of two equally sized clouds by index.
    pub fn one_to_one(
        reference: &PointCloud,
        source: &PointCloud,
    ) -> Result<Vec<Correspondence>, IcpError> {
        if reference.len() != source.len() {
            return Err(IcpError::InvalidInput(format!(
                "one to one matching needs clouds of the same size, got {} reference and {} source points",
                reference.len(),
                source.len()
            )));
        }
        Ok((0..reference.len()).map(|i| Self::new(i, i)).collect())
    }
}

/// Compute centroids of two point sets.
pub fn compute_centroids(points_src: &[[f64; 3]], points_dst: &[[f64; 3]]) -> (DVec3, DVec3) {
    let centroid = |points: &[[f64; 3]]| {
        points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p))
            / points.len() as f64
    };
    (centroid(points_src), centroid(points_dst))
}

/// Cross-covariance H = Σ[(src - src_mean) * (dst - dst_mean)^T]
fn cross_covariance(
    points_src: &[[f64; 3]],
    points_dst: &[[f64; 3]],
    src_centroid: DVec3,
    dst_centroid: DVec3,
) -> DMat3 {
    let outer = |p_src: &[f64; 3], p_dst: &[f64; 3]| {
        let src_centered = DVec3::from_array(*p_src) - src_centroid;
        let dst_centered = DVec3::from_array(*p_dst) - dst_centroid;
        DMat3::from_cols(
            src_centered * dst_centered.x,
            src_centered * dst_centered.y,
            src_centered * dst_centered.z,
        )
    };

    if points_src.len() < PARALLEL_THRESHOLD {
        points_src
            .iter()
            .zip(points_dst.iter())
            .fold(DMat3::ZERO, |acc, (s, d)| acc + outer(s, d))
    } else {
        points_src
            .par_iter()
            .zip(points_dst.par_iter())
            .map(|(s, d)| outer(s, d))
            .reduce(|| DMat3::ZERO, |a, b| a + b)
    }
}

/// Whether the slice holds at least three distinct points.
fn has_three_distinct(points: &[[f64; 3]]) -> bool {
    let mut seen: Vec<&[f64; 3]> = Vec::with_capacity(3);
    for p in points {
        if !seen.contains(&p) {
            seen.push(p);
            if seen.len() == MIN_CORRESPONDENCES {
                return true;
            }
        }
    }
    false
}

/// Compute the optimal rigid transformation between two paired point sets.
///
/// Finds the rotation and translation minimizing Σ‖dst_i − (R·src_i + t)‖²
/// with the SVD-based algorithm of Arun, Huang and Blostein (Kabsch):
///
/// 1. Compute centroids of both point sets
/// 2. Center both point sets by subtracting their respective centroids
/// 3. Compute the cross-covariance matrix H = Σ[(src - src_mean) * (dst - dst_mean)^T]
/// 4. Compute the SVD of H = U * S * V^T
/// 5. Calculate rotation matrix R = V * U^T, negating the last column of V
///    when det(R) < 0 so the result is never a reflection
/// 6. Calculate translation vector t = dst_mean - R * src_mean
///
/// For more details, see: Arun, K., Huang, T. S., and Blostein, S. D.
/// "Least-squares fitting of two 3-D point sets." IEEE PAMI, 1987.
///
/// # Arguments
///
/// * `svd` - The SVD backend.
/// * `points_src` - Source points.
/// * `points_dst` - Destination points, paired with `points_src` by index.
///
/// # Errors
///
/// * [`IcpError::InvalidInput`] when the sets are empty, differ in length or
///   hold non-finite coordinates.
/// * [`IcpError::DegenerateConfiguration`] with fewer than three pairs, fewer
///   than three distinct points on either side, or collinear points.
pub fn fit_transformation<S: Svd3 + ?Sized>(
    svd: &S,
    points_src: &[[f64; 3]],
    points_dst: &[[f64; 3]],
) -> Result<RigidTransform, IcpError> {
    if points_src.len() != points_dst.len() {
        return Err(IcpError::InvalidInput(format!(
            "point sets must have the same length, got {} and {}",
            points_src.len(),
            points_dst.len()
        )));
    }
    if points_src.is_empty() {
        return Err(IcpError::InvalidInput("point sets are empty".to_string()));
    }
    if points_src.len() < MIN_CORRESPONDENCES {
        return Err(IcpError::DegenerateConfiguration(format!(
            "need at least {MIN_CORRESPONDENCES} correspondences, got {}",
            points_src.len()
        )));
    }
    if !has_three_distinct(points_src) || !has_three_distinct(points_dst) {
        return Err(IcpError::DegenerateConfiguration(
            "fewer than 3 distinct points".to_string(),
        ));
    }

    let (src_centroid, dst_centroid) = compute_centroids(points_src, points_dst);
    if !src_centroid.is_finite() || !dst_centroid.is_finite() {
        return Err(IcpError::InvalidInput(
            "points contain non-finite coordinates".to_string(),
        ));
    }

    let h = cross_covariance(points_src, points_dst, src_centroid, dst_centroid);

    let svd_result = svd.svd3(&h)?;
    let s = svd_result.s();
    if s.x <= f64::MIN_POSITIVE || s.y <= RANK_RATIO * s.x {
        return Err(IcpError::DegenerateConfiguration(format!(
            "points are collinear (singular values {:e}, {:e}, {:e})",
            s.x, s.y, s.z
        )));
    }

    let u = *svd_result.u();
    let v = *svd_result.v();

    let mut r = v * u.transpose();

    // Handle reflection case to ensure proper rotation matrix
    if r.determinant() < 0.0 {
        let v_corrected = DMat3::from_cols(v.x_axis, v.y_axis, -v.z_axis);
        r = v_corrected * u.transpose();
    }

    let t = dst_centroid - r * src_centroid;

    Ok(RigidTransform::from_rotation_translation(r, t))
}

/// Closed-form rigid pose solver over explicit correspondences.
#[derive(Debug, Clone, Default)]
pub struct PoseSolver<S = NalgebraSvd> {
    svd: S,
}

impl<S: Svd3> PoseSolver<S> {
    /// Create a solver using the given SVD backend.
    pub fn new(svd: S) -> Self {
        Self { svd }
    }

    /// Fit a transform between two point sets already paired by index.
    pub fn fit(
        &self,
        points_src: &[[f64; 3]],
        points_dst: &[[f64; 3]],
    ) -> Result<RigidTransform, IcpError> {
        fit_transformation(&self.svd, points_src, points_dst)
    }

    /// Compute the rigid transform mapping `source` onto `reference` over the
    /// given correspondences.
    ///
    /// The returned transform `T` minimizes Σ‖reference_i − T·source_i‖².
    pub fn solve(
        &self,
        reference: &PointCloud,
        source: &PointCloud,
        correspondences: &[Correspondence],
    ) -> Result<RigidTransform, IcpError> {
        if correspondences.is_empty() {
            return Err(IcpError::InvalidInput(
                "correspondence list is empty".to_string(),
            ));
        }

        let mut points_src = Vec::with_capacity(correspondences.len());
        let mut points_dst = Vec::with_capacity(correspondences.len());
        for (i, c) in correspondences.iter().enumerate() {
            let p_dst = reference.get(c.reference).ok_or_else(|| {
                IcpError::InvalidInput(format!(
                    "correspondence {i} references point {} but the reference cloud has {} points",
                    c.reference,
                    reference.len()
                ))
            })?;
            let p_src = source.get(c.source).ok_or_else(|| {
                IcpError::InvalidInput(format!(
                    "correspondence {i} references point {} but the source cloud has {} points",
                    c.source,
                    source.len()
                ))
            })?;
            points_dst.push(*p_dst);
            points_src.push(*p_src);
        }

        self.fit(&points_src, &points_dst)
    }
}

/// Compute the rigid transform mapping `source` onto `reference` with the
/// default SVD backend.
///
/// Example:
///
/// ```
/// use rigreg_3d::PointCloud;
/// use rigreg_icp::{solve, Correspondence};
///
/// let reference = PointCloud::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// let source = PointCloud::new(vec![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 1.0]]);
/// let correspondences = Correspondence::one_to_one(&reference, &source).unwrap();
///
/// let transform = solve(&reference, &source, &correspondences).unwrap();
/// assert!((transform.translation().x + 1.0).abs() < 1e-9);
/// ```
pub fn solve(
    reference: &PointCloud,
    source: &PointCloud,
    correspondences: &[Correspondence],
) -> Result<RigidTransform, IcpError> {
    PoseSolver::<NalgebraSvd>::default().solve(reference, source, correspondences)
}
