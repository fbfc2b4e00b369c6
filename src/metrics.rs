//! Discrepancy metrics between a trial and a target eigensystem.
//!
//! Frequencies are `sqrt(eigenvalue)` taken in the complex plane, so negative
//! eigenvalues (imaginary modes) stay finite. The frequency metrics square
//! complex differences without conjugation and keep only the real part of the
//! final scalar. An imaginary residual therefore lowers the reported value
//! instead of raising it. This matches the established behavior of the
//! metric and is kept as is.
//!
//! Neither eigenvector metric aligns signs or degenerate bases between trial
//! and target.

use crate::config::Target;
use crate::error::{FitError, Result};
use crate::hessian::Eigensystem;
use nalgebra::Complex;

/// Root-mean-square deviation of two equal-length slices. Empty input gives 0.
pub fn rmsd(a: &[f64], b: &[f64]) -> Result<f64> {
    check_len("rmsd operands", a.len(), b.len())?;
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    Ok((sum / a.len() as f64).sqrt())
}

/// Complex RMSD: `sqrt(mean((a - b)^2))` with a plain complex square.
pub fn complex_rmsd(a: &[Complex<f64>], b: &[Complex<f64>]) -> Result<Complex<f64>> {
    check_len("complex rmsd operands", a.len(), b.len())?;
    if a.is_empty() {
        return Ok(Complex::new(0.0, 0.0));
    }
    let sum: Complex<f64> = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok((sum / a.len() as f64).sqrt())
}

/// Complex square roots of eigenvalues.
pub fn frequencies(eigenvalues: &[f64]) -> Vec<Complex<f64>> {
    eigenvalues.iter().map(|&e| Complex::new(e, 0.0).sqrt()).collect()
}

/// Score `trial` against `target` under `metric`.
pub fn discrepancy(metric: Target, target: &Eigensystem, trial: &Eigensystem) -> Result<f64> {
    check_len("trial vs target modes", target.len(), trial.len())?;

    let value = match metric {
        Target::Eigenvalues => rmsd(target.eigenvalues.as_slice(), trial.eigenvalues.as_slice())?,
        Target::Eigenvectors => rmsd(target.eigenvectors.as_slice(), trial.eigenvectors.as_slice())?,
        Target::Frequencies => {
            let tf = frequencies(target.eigenvalues.as_slice());
            let f = frequencies(trial.eigenvalues.as_slice());
            complex_rmsd(&tf, &f)?.re
        }
        Target::FrequencyWeightedEigenvectors => frequency_weighted_eigenvectors(target, trial).re,
    };
    Ok(value)
}

/// Sum over modes of the mean squared component difference of
/// `freq_i * vec_i`, divided by the number of modes, square-rooted.
fn frequency_weighted_eigenvectors(target: &Eigensystem, trial: &Eigensystem) -> Complex<f64> {
    let modes = target.len();
    if modes == 0 {
        return Complex::new(0.0, 0.0);
    }
    let tf = frequencies(target.eigenvalues.as_slice());
    let f = frequencies(trial.eigenvalues.as_slice());

    let mut total = Complex::new(0.0, 0.0);
    for i in 0..modes {
        let tv = target.eigenvectors.column(i);
        let v = trial.eigenvectors.column(i);
        let mode_sum: Complex<f64> = tv
            .iter()
            .zip(v.iter())
            .map(|(&a, &b)| {
                let d = tf[i] * a - f[i] * b;
                d * d
            })
            .sum();
        total += mode_sum / tv.len() as f64;
    }
    (total / modes as f64).sqrt()
}

fn check_len(context: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(FitError::DimensionMismatch { context, expected, found });
    }
    Ok(())
}
