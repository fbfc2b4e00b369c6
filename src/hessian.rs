//! Mass-weighted Hessian analysis and the fit's target state.
//!
//! The same routine, [`analyze`], is used for the reference Hessian read from
//! the checkpoint and for every trial Hessian produced during optimization,
//! so target and trial eigensystems are always ordered the same way
//! (ascending eigenvalues, ties kept in solver order).
//!
//! All quantities here are in force-field units: kJ/mol/nm² for Hessians,
//! amu for masses, kJ/mol/nm for gradients.

use crate::error::{FitError, Result};
use crate::fchk::CheckpointRecord;
use crate::units;
use nalgebra::{DMatrix, DVector};

/// Eigenvalues and matching eigenvector columns, eigenvalues ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Eigensystem {
    /// Eigenvalues in ascending order
    pub eigenvalues: DVector<f64>,
    /// Orthonormal eigenvectors, column `i` belongs to eigenvalue `i`
    pub eigenvectors: DMatrix<f64>,
}

impl Eigensystem {
    /// Number of modes
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    /// True when the system has no modes
    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }
}

/// Expand per-atom masses to one entry per Cartesian component.
pub fn broadcast_masses(masses: &[f64]) -> DVector<f64> {
    DVector::from_iterator(
        masses.len() * 3,
        masses.iter().flat_map(|&m| [m, m, m]),
    )
}

/// Compute `H_mw[i,j] = H[i,j] / sqrt(m_i * m_j)`.
pub fn mass_weighted_hessian(hessian: &DMatrix<f64>, masses: &[f64]) -> Result<DMatrix<f64>> {
    let n = masses.len() * 3;
    if hessian.nrows() != n || hessian.ncols() != n {
        return Err(FitError::DimensionMismatch {
            context: "mass weighting (Hessian size vs 3 x atoms)",
            expected: n,
            found: hessian.nrows().max(hessian.ncols()),
        });
    }

    let inv_sqrt: DVector<f64> = broadcast_masses(masses).map(|m| 1.0 / m.sqrt());
    Ok(DMatrix::from_fn(n, n, |i, j| hessian[(i, j)] * inv_sqrt[i] * inv_sqrt[j]))
}

/// Symmetric eigendecomposition with eigenvalues sorted ascending.
pub fn sorted_eigensystem(matrix: DMatrix<f64>) -> Eigensystem {
    let n = matrix.nrows();
    if n == 0 {
        // nalgebra cannot decompose an empty matrix
        return Eigensystem { eigenvalues: DVector::zeros(0), eigenvectors: DMatrix::zeros(0, 0) };
    }
    let eigen = matrix.symmetric_eigen();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    Eigensystem {
        eigenvalues: DVector::from_iterator(n, order.iter().map(|&i| eigen.eigenvalues[i])),
        eigenvectors: DMatrix::from_fn(n, n, |row, col| eigen.eigenvectors[(row, order[col])]),
    }
}

/// Mass-weight a Hessian and diagonalize it.
///
/// Pure function of its inputs; calling it twice gives identical results.
pub fn analyze(hessian: &DMatrix<f64>, masses: &[f64]) -> Result<Eigensystem> {
    let weighted = mass_weighted_hessian(hessian, masses)?;
    Ok(sorted_eigensystem(weighted))
}

/// Reference eigensystem and gradient every trial parameterization is scored against.
#[derive(Debug, Clone)]
pub struct TargetState {
    /// Eigensystem of the mass-weighted reference Hessian
    pub modes: Eigensystem,
    /// Reference gradient in kJ/mol/nm, flattened per atom
    pub gradient: DVector<f64>,
}

impl TargetState {
    /// Build from a Hessian and gradient already in force-field units.
    pub fn new(hessian: &DMatrix<f64>, gradient: DVector<f64>, masses: &[f64]) -> Result<Self> {
        if gradient.len() != masses.len() * 3 {
            return Err(FitError::DimensionMismatch {
                context: "target gradient vs 3 x atoms",
                expected: masses.len() * 3,
                found: gradient.len(),
            });
        }
        Ok(Self {
            modes: analyze(hessian, masses)?,
            gradient,
        })
    }

    /// Convert a parsed checkpoint to force-field units and build the target.
    pub fn from_checkpoint(record: &CheckpointRecord, masses: &[f64]) -> Result<Self> {
        if record.atom_count() != masses.len() {
            return Err(FitError::DimensionMismatch {
                context: "checkpoint atoms vs topology atoms",
                expected: masses.len(),
                found: record.atom_count(),
            });
        }
        let hessian = units::hessian_to_force_field(record.hessian());
        let gradient = units::gradient_to_force_field(&record.gradient_flat());
        Self::new(&hessian, gradient, masses)
    }

    /// Target eigenvalues, ascending
    pub fn eigenvalues(&self) -> &DVector<f64> {
        &self.modes.eigenvalues
    }

    /// Target eigenvectors, one column per eigenvalue
    pub fn eigenvectors(&self) -> &DMatrix<f64> {
        &self.modes.eigenvectors
    }
}
