//! hessfit - Force-Field Parameter Fitting to Quantum-Chemistry Hessians
//!
//! hessfit tunes bonded force-field parameters (bond, angle and dihedral
//! force constants and equilibrium values) so that the force field's
//! mass-weighted Cartesian Hessian at a fixed reference geometry reproduces a
//! Hessian computed by a quantum-chemistry program. The reference gradient
//! can be matched at the same time.
//!
//! # Workflow
//!
//! 1. Parse a Gaussian formatted checkpoint (`.fchk`): atom count,
//!    coordinates, lower-triangular Cartesian force constants and gradient.
//! 2. Convert to force-field units (kJ/mol, nm), mass-weight the Hessian
//!    with the topology's masses and diagonalize it. This is the target.
//! 3. Encode the selected topology parameters into a flat guess vector.
//! 4. Minimize a cost over that vector. Each evaluation writes the vector
//!    back into the topology, re-evaluates the force field at the reference
//!    geometry and compares the trial eigensystem to the target:
//!
//!    ```text
//!    cost = discrepancy(target, trial) + k_gradient * RMSD(g_target, g_trial)
//!    ```
//!
//! # Metrics
//!
//! | Target | Discrepancy |
//! |--------|-------------|
//! | `eigenvalues` | RMSD of ascending eigenvalues |
//! | `eigenvectors` | entrywise RMSD of eigenvector matrices |
//! | `frequencies` | RMSD of `sqrt(eigenvalue)` in the complex plane, real part |
//! | `frequency_weighted_eigenvectors` | distance of frequency-scaled eigenvectors |
//!
//! # Quick Start
//!
//! ```no_run
//! use hessfit::config::FitOptions;
//! use hessfit::fit::fit_files;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = FitOptions::default();
//!     let (outcome, fitted) = fit_files(Path::new("mol.fchk"), Path::new("mol.json"), &options)?;
//!     println!("cost {} -> {}", outcome.initial.total, outcome.fitted.total);
//!     fitted.save(Path::new("mol_fitted.json"))?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`fchk`](fchk/index.html) - Formatted checkpoint parser
//! - [`units`](units/index.html) - Unit constants and conversions
//! - [`hessian`](hessian/index.html) - Mass weighting, eigen-analysis, target state
//! - [`topology`](topology/index.html) - Bonded topology model
//! - [`engine`](engine/index.html) - Force-field evaluation
//! - [`params`](params/index.html) - Parameter vector codec
//! - [`metrics`](metrics/index.html) - Discrepancy metrics
//! - [`cost`](cost/index.html) - Cost function
//! - [`optimizer`](optimizer/index.html) - Minimizers
//! - [`fit`](fit/index.html) - Fitting driver
//! - [`config`](config/index.html) - Fit options
//! - [`settings`](settings/index.html) - Settings file
//! - [`report`](report/index.html) - JSON fit report

pub mod config;
/// Evaluation context and cost function
pub mod cost;
pub mod engine;
/// Crate-wide error type
pub mod error;
pub mod fchk;
pub mod fit;
pub mod hessian;
pub mod metrics;
/// Minimizer interface and argmin-backed implementation
pub mod optimizer;
pub mod params;
pub mod report;
/// Settings file management
pub mod settings;
pub mod topology;
pub mod units;

pub use config::{FitOptions, Method, Target};
pub use error::{FitError, Result};
pub use fchk::CheckpointRecord;
pub use fit::{FitOutcome, FitSession};
pub use topology::Topology;
