use glam::DVec3;

/// A point cloud: an ordered sequence of 3D points in a fixed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from its points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get the point at `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&[f64; 3]> {
        self.points.get(index)
    }

    /// Mean position of the points, or `None` for an empty cloud.
    pub fn centroid(&self) -> Option<DVec3> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p));
        Some(sum / self.points.len() as f64)
    }

    /// Get the minimum bound of the point cloud.
    pub fn get_min_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(DVec3::min)
            .unwrap_or(DVec3::ZERO)
    }

    /// Get the maximum bound of the point cloud.
    pub fn get_max_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(DVec3::max)
            .unwrap_or(DVec3::ZERO)
    }
}

impl From<Vec<[f64; 3]>> for PointCloud {
    fn from(points: Vec<[f64; 3]>) -> Self {
        Self::new(points)
    }
}
