use rigreg_3d::{PointCloud, RigidTransform};
use rigreg_linalg::{NalgebraSvd, Svd3};
use serde::{Deserialize, Serialize};

use crate::{
    config::IcpConfig,
    correspondences::{find_correspondences, ReferenceIndex},
    error::IcpError,
    pose::PoseSolver,
};

/// How a registration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcpStatus {
    /// The residual improvement or the residual itself fell below its threshold.
    Converged,
    /// The iteration budget ran out. The transform is the lowest residual
    /// iterate found so far.
    IterationLimitReached,
    /// An iteration after the first had too few usable correspondences or the
    /// SVD failed on them. The transform is the lowest residual iterate
    /// accepted before that iteration.
    DegenerateConfiguration,
}

/// Result of the ICP algorithm.
///
/// The transformation is from the source to the reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcpResult {
    /// Estimated source to reference transform.
    pub transform: RigidTransform,
    /// Terminal state of the registration.
    pub status: IcpStatus,
    /// The total number of accepted iterations.
    pub num_iterations: usize,
    /// RMSE of the iteration that produced `transform`.
    pub rmse: f64,
    /// Fraction of source points with an accepted correspondence in that iteration.
    pub fitness: f64,
    /// Number of correspondences used in that iteration.
    pub num_correspondences: usize,
    /// RMSE of every accepted iteration, in order.
    pub residual_history: Vec<f64>,
}

impl IcpResult {
    /// Whether the registration ended in [`IcpStatus::Converged`].
    pub fn is_converged(&self) -> bool {
        self.status == IcpStatus::Converged
    }
}

/// Outcome of a single ICP iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IcpIteration {
    /// Accumulated transform after this iteration.
    pub transform: RigidTransform,
    /// Incremental transform estimated in this iteration.
    pub increment: RigidTransform,
    /// RMSE of the correspondences after applying the increment.
    pub rmse: f64,
    /// Number of correspondences that survived rejection.
    pub num_correspondences: usize,
}

/// Point to point ICP against a fixed reference cloud.
///
/// The nearest neighbour index over the reference is built once in
/// [`IcpRegistration::new`] and reused by every call to [`IcpRegistration::step`]
/// and [`IcpRegistration::register`].
pub struct IcpRegistration<'a, S = NalgebraSvd> {
    index: ReferenceIndex<'a>,
    solver: PoseSolver<S>,
    config: IcpConfig,
}

impl<'a> IcpRegistration<'a, NalgebraSvd> {
    /// Prepare a registration against `reference` with the default SVD backend.
    pub fn new(reference: &'a PointCloud, config: IcpConfig) -> Result<Self, IcpError> {
        Self::with_solver(reference, config, PoseSolver::default())
    }
}

impl<'a, S: Svd3> IcpRegistration<'a, S> {
    /// Prepare a registration against `reference` with a custom pose solver.
    pub fn with_solver(
        reference: &'a PointCloud,
        config: IcpConfig,
        solver: PoseSolver<S>,
    ) -> Result<Self, IcpError> {
        config.validate()?;
        let index = ReferenceIndex::new(reference)?;
        Ok(Self {
            index,
            solver,
            config,
        })
    }

    /// The configuration of this registration.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// The reference cloud.
    pub fn reference(&self) -> &'a PointCloud {
        self.index.cloud()
    }

    /// Run one iteration starting from `accumulated`.
    ///
    /// Moves the source with `accumulated`, pairs every moved point with its
    /// nearest reference point, solves for the incremental transform and
    /// returns `increment · accumulated`.
    pub fn step(
        &self,
        source: &PointCloud,
        accumulated: &RigidTransform,
    ) -> Result<IcpIteration, IcpError> {
        let mut moved = vec![[0.0; 3]; source.len()];
        self.step_with_buffer(source, accumulated, &mut moved)
    }

    fn step_with_buffer(
        &self,
        source: &PointCloud,
        accumulated: &RigidTransform,
        moved: &mut [[f64; 3]],
    ) -> Result<IcpIteration, IcpError> {
        accumulated.transform_points_into(source.points(), moved)?;

        let matches = find_correspondences(&self.index, moved, &self.config);
        if matches.is_empty() {
            return Err(IcpError::DegenerateConfiguration(
                "no correspondences survived rejection".to_string(),
            ));
        }

        let reference = self.index.cloud().points();
        let (points_src, points_dst): (Vec<_>, Vec<_>) = matches
            .iter()
            .map(|m| {
                (
                    moved[m.correspondence.source],
                    reference[m.correspondence.reference],
                )
            })
            .unzip();

        let increment = self.solver.fit(&points_src, &points_dst)?;

        // compute error between transformed source and reference
        let sum_sq = points_src
            .iter()
            .zip(points_dst.iter())
            .map(|(s, d)| {
                let p = increment.transform_point(s);
                (p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2) + (p[2] - d[2]).powi(2)
            })
            .sum::<f64>();
        let rmse = (sum_sq / points_src.len() as f64).sqrt();

        Ok(IcpIteration {
            transform: increment.compose(accumulated),
            increment,
            rmse,
            num_correspondences: matches.len(),
        })
    }

    /// Register `source` onto the reference cloud.
    ///
    /// Starts from the configured initial transform and iterates until the
    /// residual converges or the iteration budget runs out.
    ///
    /// # Errors
    ///
    /// * [`IcpError::InvalidInput`] for an empty or non-finite source.
    /// * [`IcpError::DegenerateConfiguration`] or [`IcpError::Linalg`] when the
    ///   first iteration cannot estimate a transform. The same failures in a
    ///   later iteration end the run with [`IcpStatus::DegenerateConfiguration`].
    pub fn register(&self, source: &PointCloud) -> Result<IcpResult, IcpError> {
        if source.is_empty() {
            return Err(IcpError::InvalidInput("source cloud is empty".to_string()));
        }
        if let Some(i) = source
            .points()
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(IcpError::InvalidInput(format!(
                "source point {i} has non-finite coordinates"
            )));
        }

        let mut result = IcpResult {
            transform: self.config.initial_transform,
            status: IcpStatus::IterationLimitReached,
            num_iterations: 0,
            rmse: f64::INFINITY,
            fitness: 0.0,
            num_correspondences: 0,
            residual_history: Vec::with_capacity(self.config.max_iterations),
        };

        let mut current = self.config.initial_transform;
        let mut prev_rmse = f64::INFINITY;
        let mut moved = vec![[0.0; 3]; source.len()];

        // main icp loop
        for i in 0..self.config.max_iterations {
            log::debug!("Iteration: {}", i);
            let now = std::time::Instant::now();

            let iteration = match self.step_with_buffer(source, &current, &mut moved) {
                Ok(iteration) => iteration,
                Err(err)
                    if i > 0 && (err.is_degenerate() || matches!(err, IcpError::Linalg(_))) =>
                {
                    log::warn!("ICP stopped at iteration {}: {}", i, err);
                    result.status = IcpStatus::DegenerateConfiguration;
                    return Ok(result);
                }
                Err(err) => return Err(err),
            };

            log::debug!(
                "Num correspondences: {}, rmse: {}",
                iteration.num_correspondences,
                iteration.rmse
            );

            let improvement = (prev_rmse - iteration.rmse).abs();
            let converged = iteration.rmse <= self.config.absolute_residual_threshold
                || improvement < self.config.convergence_tolerance;

            current = iteration.transform;
            prev_rmse = iteration.rmse;
            result.num_iterations += 1;
            result.residual_history.push(iteration.rmse);

            // keep the lowest residual iterate, or the final one on convergence
            if converged || iteration.rmse < result.rmse {
                result.transform = iteration.transform;
                result.rmse = iteration.rmse;
                result.num_correspondences = iteration.num_correspondences;
                result.fitness = iteration.num_correspondences as f64 / source.len() as f64;
            }

            log::debug!("elapsed: {:?}", now.elapsed());

            if converged {
                log::info!(
                    "ICP converged in {} iterations with error {}",
                    result.num_iterations,
                    result.rmse
                );
                result.status = IcpStatus::Converged;
                return Ok(result);
            }
        }

        log::warn!(
            "ICP reached the iteration limit ({}), best error {}",
            self.config.max_iterations,
            result.rmse
        );
        Ok(result)
    }
}

/// Iterative Closest Point (ICP) algorithm using point to point distance.
///
/// Builds a fresh [`IcpRegistration`] for `reference` and registers `source`
/// onto it, starting from `config.initial_transform`.
///
/// # Arguments
///
/// * `reference` - Reference point cloud.
/// * `source` - Source point cloud.
/// * `config` - Iteration budget, thresholds and initial transform.
///
/// # Returns
///
/// The source to reference transform with the terminal status and residuals.
pub fn register(
    reference: &PointCloud,
    source: &PointCloud,
    config: &IcpConfig,
) -> Result<IcpResult, IcpError> {
    IcpRegistration::new(reference, config.clone())?.register(source)
}
