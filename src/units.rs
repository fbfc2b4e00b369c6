//! Unit conventions shared by the checkpoint data and the force-field engine.
//!
//! Checkpoint files carry Hartree-based atomic units (energies in Hartree,
//! lengths in Bohr). The force-field engine works in kJ/mol and nanometers,
//! with masses in amu. Every conversion between the two systems goes through
//! the constants below; they are fixed, so conversion itself cannot fail.

use nalgebra::{DMatrix, DVector};

/// Hartree to kJ/mol
pub const HARTREE_TO_KJ_PER_MOL: f64 = 2625.5002;
/// Bohr to nanometer
pub const BOHR_TO_NM: f64 = 0.052917721092;

/// Multiplier taking a Hessian from Hartree/Bohr² to kJ/mol/nm²
pub const HESSIAN_FACTOR: f64 = HARTREE_TO_KJ_PER_MOL / (BOHR_TO_NM * BOHR_TO_NM);
/// Multiplier taking a gradient from Hartree/Bohr to kJ/mol/nm
pub const GRADIENT_FACTOR: f64 = HARTREE_TO_KJ_PER_MOL / BOHR_TO_NM;

/// Convert coordinates from Bohr to nanometers
pub fn bohr_to_nm(coords: &DVector<f64>) -> DVector<f64> {
    coords * BOHR_TO_NM
}

/// Convert coordinates from nanometers to Bohr
pub fn nm_to_bohr(coords: &DVector<f64>) -> DVector<f64> {
    coords / BOHR_TO_NM
}

/// Convert a Cartesian Hessian from Hartree/Bohr² to kJ/mol/nm²
pub fn hessian_to_force_field(hessian: &DMatrix<f64>) -> DMatrix<f64> {
    hessian * HESSIAN_FACTOR
}

/// Convert a Cartesian gradient from Hartree/Bohr to kJ/mol/nm
pub fn gradient_to_force_field(gradient: &DVector<f64>) -> DVector<f64> {
    gradient * GRADIENT_FACTOR
}
