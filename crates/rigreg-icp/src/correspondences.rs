use kiddo::immutable::float::kdtree::ImmutableKdTree;
use rayon::prelude::*;
use rigreg_3d::PointCloud;

use crate::{config::IcpConfig, error::IcpError, pose::Correspondence};

/// Scale factor turning a median absolute deviation into a gaussian sigma.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Nearest neighbour index over a reference point cloud.
///
/// Built once per registration and shared read-only between iterations.
pub struct ReferenceIndex<'a> {
    cloud: &'a PointCloud,
    kdtree: ImmutableKdTree<f64, u32, 3, 32>,
}

impl<'a> ReferenceIndex<'a> {
    /// Build the index over `cloud`.
    ///
    /// Fails with [`IcpError::InvalidInput`] when the cloud is empty, holds
    /// non-finite coordinates, or has more points than a `u32` can address.
    pub fn new(cloud: &'a PointCloud) -> Result<Self, IcpError> {
        if cloud.is_empty() {
            return Err(IcpError::InvalidInput(
                "reference cloud is empty".to_string(),
            ));
        }
        if cloud.len() > u32::MAX as usize {
            return Err(IcpError::InvalidInput(format!(
                "reference cloud has {} points, at most {} are supported",
                cloud.len(),
                u32::MAX
            )));
        }
        if let Some(i) = cloud
            .points()
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(IcpError::InvalidInput(format!(
                "reference point {i} has non-finite coordinates"
            )));
        }

        let kdtree = ImmutableKdTree::new_from_slice(cloud.points());
        Ok(Self { cloud, kdtree })
    }

    /// The indexed reference cloud.
    pub fn cloud(&self) -> &'a PointCloud {
        self.cloud
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    /// Always false: empty clouds are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    /// Closest reference point to `query` as `(index, euclidean distance)`.
    pub fn nearest(&self, query: &[f64; 3]) -> (usize, f64) {
        let nn = self.kdtree.nearest_one::<kiddo::SquaredEuclidean>(query);
        (nn.item as usize, nn.distance.sqrt())
    }
}

/// A correspondence together with the distance between its two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Reference and source indices.
    pub correspondence: Correspondence,
    /// Euclidean distance between the paired points.
    pub distance: f64,
}

/// Pair every point of `source` with its nearest reference point and drop
/// the pairs rejected by `config`.
///
/// `source` holds the source points already moved into the reference frame;
/// the source index of each match is the position in this slice.
pub fn find_correspondences(
    index: &ReferenceIndex<'_>,
    source: &[[f64; 3]],
    config: &IcpConfig,
) -> Vec<Match> {
    // find nearest neighbors for each point in source
    let mut matches = source
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            let (reference, distance) = index.nearest(p);
            Match {
                correspondence: Correspondence::new(reference, i),
                distance,
            }
        })
        .collect::<Vec<_>>();

    if let Some(max_distance) = config.correspondence_rejection_distance {
        matches.retain(|m| m.distance <= max_distance);
    }

    if config.robust_rejection {
        if let Some(cutoff) = robust_cutoff(&matches) {
            matches.retain(|m| m.distance <= cutoff);
        }
    }

    matches
}

/// Distance cutoff at median + 3 sigma, sigma from the median absolute deviation.
fn robust_cutoff(matches: &[Match]) -> Option<f64> {
    let mut distances = matches.iter().map(|m| m.distance).collect::<Vec<_>>();
    let median_dist = median(&mut distances)?;

    let mut dmed = distances
        .iter()
        .map(|d| (d - median_dist).abs())
        .collect::<Vec<_>>();
    let mad = median(&mut dmed)?;
    let sigma_d = MAD_TO_SIGMA * mad;

    Some(median_dist + 3.0 * sigma_d)
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    Some(values[values.len() / 2])
}
