//! Fit options: discrepancy metric, optimizer method, gradient weight and
//! parameter selection.
//!
//! - [`Target`]: which eigensystem quantity is matched
//! - [`Method`]: which numerical minimizer drives the fit
//! - [`FitOptions`]: everything a single fit needs besides its inputs
//!
//! Metric and method names are parsed into closed enums up front, so a
//! misspelled name is rejected before the force field is ever evaluated.

use crate::error::{FitError, Result};
use crate::params::FitFlags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quantity compared between the trial and target mass-weighted Hessians.
///
/// | Target | Compared |
/// |--------|----------|
/// | `Eigenvalues` | eigenvalues, index for index |
/// | `Eigenvectors` | full eigenvector matrices, entrywise |
/// | `Frequencies` | complex square roots of eigenvalues |
/// | `FrequencyWeightedEigenvectors` | eigenvectors scaled by their frequency |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// RMSD of sorted eigenvalues
    Eigenvalues,
    /// Entrywise RMSD of eigenvectors, no sign alignment
    Eigenvectors,
    /// RMSD of complex frequencies, real part kept
    Frequencies,
    /// Frequency-scaled eigenvector distance, averaged over modes
    FrequencyWeightedEigenvectors,
}

impl Target {
    /// Every metric, in declaration order
    pub const ALL: [Target; 4] = [
        Target::Eigenvalues,
        Target::Eigenvectors,
        Target::Frequencies,
        Target::FrequencyWeightedEigenvectors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Eigenvalues => "eigenvalues",
            Target::Eigenvectors => "eigenvectors",
            Target::Frequencies => "frequencies",
            Target::FrequencyWeightedEigenvectors => "frequency_weighted_eigenvectors",
        }
    }
}

impl FromStr for Target {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "eigenvalues" => Ok(Target::Eigenvalues),
            "eigenvectors" => Ok(Target::Eigenvectors),
            "frequencies" => Ok(Target::Frequencies),
            "frequency_weighted_eigenvectors" => Ok(Target::FrequencyWeightedEigenvectors),
            other => Err(FitError::InvalidConfiguration(format!(
                "'{}' is not a valid target (expected eigenvalues, eigenvectors, frequencies or frequency_weighted_eigenvectors)",
                other
            ))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Derivative-free simplex search
    NelderMead,
    /// Limited-memory BFGS on a finite-difference gradient
    Lbfgs,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::NelderMead => "nelder-mead",
            Method::Lbfgs => "lbfgs",
        }
    }
}

impl FromStr for Method {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "nelder-mead" | "neldermead" => Ok(Method::NelderMead),
            "lbfgs" | "l-bfgs" | "l-bfgs-b" => Ok(Method::Lbfgs),
            other => Err(FitError::InvalidConfiguration(format!(
                "'{}' is not a supported optimizer method (expected nelder-mead or lbfgs)",
                other
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one fit.
///
/// # Default Values
///
/// - method: `nelder-mead`
/// - target: `eigenvalues`
/// - k_gradient: 1.0
/// - flags: bond, angle and dihedral force constants
/// - max_iters: 500
/// - tolerance: 1e-8
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub method: Method,
    pub target: Target,
    /// Weight of the gradient RMSD term; 0 disables gradient matching
    pub k_gradient: f64,
    pub flags: FitFlags,
    /// Iteration cap handed to the minimizer
    pub max_iters: u64,
    /// Convergence tolerance handed to the minimizer
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            method: Method::NelderMead,
            target: Target::Eigenvalues,
            k_gradient: 1.0,
            flags: FitFlags::default(),
            max_iters: 500,
            tolerance: 1e-8,
        }
    }
}

impl FitOptions {
    /// Reject weights and limits the minimizer cannot use.
    pub fn validate(&self) -> Result<()> {
        if !self.k_gradient.is_finite() || self.k_gradient < 0.0 {
            return Err(FitError::InvalidConfiguration(format!(
                "k_gradient must be finite and non-negative, got {}",
                self.k_gradient
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(FitError::InvalidConfiguration(format!(
                "tolerance must be finite and positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_names_round_trip() {
        for t in Target::ALL {
            assert_eq!(t.to_string().parse::<Target>().unwrap(), t);
        }
    }

    #[test]
    fn test_bogus_target_is_invalid_configuration() {
        let err = "bogus".parse::<Target>().unwrap_err();
        assert!(matches!(err, FitError::InvalidConfiguration(ref m) if m.contains("bogus")));
    }

    #[test]
    fn test_method_aliases() {
        assert_eq!("Nelder_Mead".parse::<Method>().unwrap(), Method::NelderMead);
        assert_eq!("L-BFGS-B".parse::<Method>().unwrap(), Method::Lbfgs);
        assert!("slsqp".parse::<Method>().is_err());
    }

    #[test]
    fn test_defaults() {
        let opts = FitOptions::default();
        assert_eq!(opts.method, Method::NelderMead);
        assert_eq!(opts.target, Target::Eigenvalues);
        assert_eq!(opts.k_gradient, 1.0);
        assert!(opts.flags.bonds_k && !opts.flags.bonds_req);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_negative_gradient_weight_rejected() {
        let opts = FitOptions { k_gradient: -1.0, ..Default::default() };
        assert!(matches!(opts.validate(), Err(FitError::InvalidConfiguration(_))));
        let opts = FitOptions { k_gradient: f64::NAN, ..Default::default() };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_serde_spellings() {
        let opts = FitOptions { target: Target::FrequencyWeightedEigenvectors, ..Default::default() };
        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"frequency_weighted_eigenvectors\""));
        assert!(json.contains("\"nelder-mead\""));
        let back: FitOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
