//! Singular Value Decomposition (SVD) of 3×3 matrices.
//!
//! The pose solver needs exactly one dense linear-algebra primitive: the SVD of
//! the 3×3 cross-covariance matrix of two corresponded point sets. This module
//! exposes that primitive behind the [`Svd3`] trait so callers can inject the
//! backend they want.
//!
//! # Mathematical Background
//!
//! For any matrix A ∈ ℝ³ˣ³, the SVD decomposes it into three matrices:
//!
//! ```text
//! A = U Σ Vᵀ
//! ```
//!
//! where:
//! * U ∈ ℝ³ˣ³ is an orthogonal matrix (left singular vectors)
//! * Σ ∈ ℝ³ˣ³ is a diagonal matrix of singular values (σ₁ ≥ σ₂ ≥ σ₃ ≥ 0)
//! * V ∈ ℝ³ˣ³ is an orthogonal matrix (right singular vectors)
//!
//! # Backends
//!
//! * [`NalgebraSvd`] delegates to `nalgebra::SVD` (Golub-Kahan bidiagonalization).
//! * [`JacobiSvd`] is a small in-house decomposition: a cyclic Jacobi
//!   eigenanalysis of AᵀA yields V, and U is obtained by orthonormalizing the
//!   columns of A·V.
//!
//! # Example
//!
//! ```
//! use glam::{DMat3, DVec3};
//! use rigreg_linalg::svd::{JacobiSvd, Svd3};
//!
//! let matrix = DMat3::from_diagonal(DVec3::new(1.0, 2.0, 3.0));
//!
//! let svd_result = JacobiSvd::default().svd3(&matrix).unwrap();
//! assert!((svd_result.s().x - 3.0).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! * McAdams, Selle, Tamstorf, Teran, and Sifakis (2011).
//!   "Computing the Singular Value Decomposition of 3x3 matrices with minimal
//!   branching and elementary floating point operations."
//!   University of Wisconsin-Madison Technical Report TR1690.
//! * Press et al., "Numerical Recipes", section 11.1 (Jacobi transformations).

use glam::{DMat3, DVec3};
use nalgebra::{Matrix3, SVD};

/// Error type for the 3x3 SVD backends.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LinalgError {
    /// The input matrix contains NaN or infinite entries.
    #[error("Matrix contains non-finite values")]
    NonFiniteInput,

    /// The decomposition did not converge within the iteration budget.
    #[error("SVD did not converge after {0} iterations")]
    NoConvergence(usize),
}

/// Helper struct to store the three factors of the decomposition.
#[derive(Debug, Clone)]
pub struct SVD3Set {
    /// The matrix of left singular vectors.
    u: DMat3,

    /// The singular values, sorted in descending order.
    s: DVec3,

    /// The matrix of right singular vectors.
    v: DMat3,
}

impl SVD3Set {
    /// Get the left singular vectors matrix.
    #[inline]
    pub fn u(&self) -> &DMat3 {
        &self.u
    }

    /// Get the singular values in descending order.
    #[inline]
    pub fn s(&self) -> &DVec3 {
        &self.s
    }

    /// Get the right singular vectors matrix.
    #[inline]
    pub fn v(&self) -> &DMat3 {
        &self.v
    }

    /// Rebuild the decomposed matrix as U Σ Vᵀ.
    pub fn reconstruct(&self) -> DMat3 {
        self.u * DMat3::from_diagonal(self.s) * self.v.transpose()
    }

    /// Reorder the factors so the singular values are sorted in descending order.
    fn sorted(u: DMat3, s: [f64; 3], v: DMat3) -> Self {
        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));
        Self {
            u: DMat3::from_cols(u.col(order[0]), u.col(order[1]), u.col(order[2])),
            s: DVec3::new(s[order[0]], s[order[1]], s[order[2]]),
            v: DMat3::from_cols(v.col(order[0]), v.col(order[1]), v.col(order[2])),
        }
    }
}

/// A backend able to decompose a 3x3 matrix.
///
/// Implementations must return singular values sorted in descending order with
/// the columns of U and V permuted accordingly.
pub trait Svd3: Send + Sync {
    /// Compute the singular value decomposition of `a`.
    fn svd3(&self, a: &DMat3) -> Result<SVD3Set, LinalgError>;
}

fn ensure_finite(a: &DMat3) -> Result<(), LinalgError> {
    if a.is_finite() {
        Ok(())
    } else {
        Err(LinalgError::NonFiniteInput)
    }
}

/// SVD backed by `nalgebra`.
#[derive(Debug, Clone)]
pub struct NalgebraSvd {
    /// Maximum number of iterations handed to the bidiagonal solver.
    pub max_iterations: usize,
}

impl Default for NalgebraSvd {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
        }
    }
}

impl Svd3 for NalgebraSvd {
    fn svd3(&self, a: &DMat3) -> Result<SVD3Set, LinalgError> {
        ensure_finite(a)?;

        // glam and nalgebra are both column-major
        let m = Matrix3::from_column_slice(&a.to_cols_array());
        let svd = SVD::try_new(m, true, true, f64::EPSILON, self.max_iterations)
            .ok_or(LinalgError::NoConvergence(self.max_iterations))?;

        let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
            return Err(LinalgError::NoConvergence(self.max_iterations));
        };

        let u = DMat3::from_cols_slice(u.as_slice());
        let v = DMat3::from_cols_slice(v_t.transpose().as_slice());
        let s = svd.singular_values;

        Ok(SVD3Set::sorted(u, [s[0], s[1], s[2]], v))
    }
}

/// In-house SVD based on a cyclic Jacobi eigenanalysis of AᵀA.
#[derive(Debug, Clone)]
pub struct JacobiSvd {
    /// Maximum number of Jacobi sweeps over the three off-diagonal pairs.
    pub max_sweeps: usize,
    /// Relative off-diagonal norm below which the eigenanalysis stops.
    pub tolerance: f64,
}

impl Default for JacobiSvd {
    fn default() -> Self {
        Self {
            max_sweeps: 32,
            tolerance: 1e-14,
        }
    }
}

/// Row-major symmetric 3x3 matrix used during the eigenanalysis.
type Sym3 = [[f64; 3]; 3];

fn off_diagonal_norm(s: &Sym3) -> f64 {
    (s[0][1] * s[0][1] + s[0][2] * s[0][2] + s[1][2] * s[1][2]).sqrt()
}

/// Apply the Jacobi rotation that annihilates `s[p][q]`, accumulating it into `v`.
fn jacobi_rotate(s: &mut Sym3, v: &mut Sym3, p: usize, q: usize) {
    let s_pq = s[p][q];
    if s_pq.abs() <= f64::MIN_POSITIVE {
        return;
    }

    let theta = (s[q][q] - s[p][p]) / (2.0 * s_pq);
    let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
    let c = 1.0 / t.hypot(1.0);
    let sn = t * c;

    // S <- S * P
    for row in s.iter_mut() {
        let (a_kp, a_kq) = (row[p], row[q]);
        row[p] = c * a_kp - sn * a_kq;
        row[q] = sn * a_kp + c * a_kq;
    }

    // S <- P^T * S
    for k in 0..3 {
        let (a_pk, a_qk) = (s[p][k], s[q][k]);
        s[p][k] = c * a_pk - sn * a_qk;
        s[q][k] = sn * a_pk + c * a_qk;
    }
    s[p][q] = 0.0;
    s[q][p] = 0.0;

    // V <- V * P
    for row in v.iter_mut() {
        let (v_kp, v_kq) = (row[p], row[q]);
        row[p] = c * v_kp - sn * v_kq;
        row[q] = sn * v_kp + c * v_kq;
    }
}

impl JacobiSvd {
    /// Eigen-decompose a symmetric matrix, returning the eigenvalues and the
    /// eigenvectors as the columns of a matrix.
    fn jacobi_eigenanalysis(&self, mut s: Sym3) -> Result<([f64; 3], DMat3), LinalgError> {
        let mut v: Sym3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let scale = s.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();

        let mut converged = scale == 0.0;
        for _ in 0..self.max_sweeps {
            if off_diagonal_norm(&s) <= self.tolerance * scale {
                converged = true;
                break;
            }
            jacobi_rotate(&mut s, &mut v, 0, 1);
            jacobi_rotate(&mut s, &mut v, 0, 2);
            jacobi_rotate(&mut s, &mut v, 1, 2);
        }

        if !converged && off_diagonal_norm(&s) > self.tolerance * scale {
            return Err(LinalgError::NoConvergence(self.max_sweeps));
        }

        let eigenvectors = DMat3::from_cols_array_2d(&v).transpose();
        Ok(([s[0][0], s[1][1], s[2][2]], eigenvectors))
    }
}

impl Svd3 for JacobiSvd {
    fn svd3(&self, a: &DMat3) -> Result<SVD3Set, LinalgError> {
        ensure_finite(a)?;

        // eigenvectors of A^T * A are the right singular vectors
        let ata = (a.transpose() * *a).to_cols_array_2d();
        let (eigenvalues, v) = self.jacobi_eigenanalysis(ata)?;

        // sort by eigenvalue so the columns of B = A * V come out by decreasing norm
        let sorted = SVD3Set::sorted(DMat3::IDENTITY, eigenvalues, v);
        let v = sorted.v;
        let b = *a * v;

        // orthonormalize the columns of B to get U, completing rank deficient bases
        let b0 = b.x_axis;
        let b1 = b.y_axis;
        let b2 = b.z_axis;
        let rank_eps = 16.0 * f64::EPSILON * b0.length().max(f64::MIN_POSITIVE);

        let u0 = if b0.length() > f64::MIN_POSITIVE {
            b0.normalize()
        } else {
            DVec3::X
        };

        let w1 = b1 - u0 * u0.dot(b1);
        let u1 = if w1.length() > rank_eps {
            w1.normalize()
        } else {
            u0.any_orthonormal_vector()
        };

        let mut u2 = u0.cross(u1);
        if u2.dot(b2) < 0.0 {
            u2 = -u2;
        }

        let s = [
            u0.dot(b0).max(0.0),
            u1.dot(b1).max(0.0),
            u2.dot(b2).max(0.0),
        ];

        Ok(SVD3Set::sorted(DMat3::from_cols(u0, u1, u2), s, v))
    }
}
