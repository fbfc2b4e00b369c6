//! JSON summary of a finished fit.
//!
//! The report records the options the fit ran with, every fitted parameter
//! with its starting and final value, the cost terms before and after, and
//! the minimizer's termination status. Target eigenvalues are included so a
//! report can be compared against later fits without re-reading the
//! checkpoint.
//!
//! ```no_run
//! use hessfit::report::FitReport;
//! use std::path::Path;
//!
//! let report = FitReport::load(Path::new("report.json"))?;
//! for p in &report.parameters {
//!     println!("{} #{}: {} -> {}", p.kind, p.type_index, p.initial, p.fitted);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::FitOptions;
use crate::cost::CostBreakdown;
use crate::fit::{FitOutcome, FitSession};
use crate::params::ParameterKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One fitted scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedParameter {
    pub kind: ParameterKind,
    pub type_index: usize,
    pub position: usize,
    pub initial: f64,
    pub fitted: f64,
}

/// Serializable record of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub options: FitOptions,
    pub atom_count: usize,
    pub parameters: Vec<FittedParameter>,
    pub initial: CostBreakdown,
    pub fitted: CostBreakdown,
    pub converged: bool,
    pub iterations: u64,
    pub evaluations: usize,
    pub termination: String,
    /// Ascending eigenvalues of the mass-weighted reference Hessian
    pub target_eigenvalues: Vec<f64>,
}

impl FitReport {
    pub fn new(session: &FitSession, outcome: &FitOutcome, options: &FitOptions) -> Self {
        let parameters = outcome
            .slots
            .iter()
            .map(|slot| FittedParameter {
                kind: slot.kind,
                type_index: slot.type_index,
                position: slot.position,
                initial: outcome.x0[slot.position],
                fitted: outcome.result.x[slot.position],
            })
            .collect();

        Self {
            options: options.clone(),
            atom_count: session.record().atom_count(),
            parameters,
            initial: outcome.initial,
            fitted: outcome.fitted,
            converged: outcome.result.converged,
            iterations: outcome.result.iterations,
            evaluations: outcome.evaluations,
            termination: outcome.result.termination.clone(),
            target_eigenvalues: session.target().eigenvalues().iter().cloned().collect(),
        }
    }

    /// Save the report as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a report written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
