//! Crate-level error taxonomy for Hessian fitting.
//!
//! Every fallible module owns a narrow error enum ([`ParseError`],
//! [`TopologyError`], [`EngineError`], [`ConfigError`]); [`FitError`]
//! aggregates them so the fitting driver and the cost function can use `?`
//! across module boundaries.
//!
//! Errors raised inside the cost function travel through the argmin executor
//! as `argmin::core::Error` and are recovered here by downcasting, so callers
//! of the driver never see raw argmin errors.

use crate::engine::EngineError;
use crate::fchk::ParseError;
use crate::settings::ConfigError;
use crate::topology::TopologyError;
use thiserror::Error;

/// Error type for fitting operations.
#[derive(Error, Debug)]
pub enum FitError {
    /// The checkpoint file could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The topology could not be loaded or is inconsistent
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// The force-field engine failed to evaluate
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// A settings file could not be read
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Unrecognized metric or method name, or an out-of-range option
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Two collections that must agree in size do not
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// What was being compared
        context: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        found: usize,
    },
    /// A parameter slot points outside the topology or the guess vector
    #[error("Parameter slot {position} ({kind}) is out of range: {reason}")]
    InvalidSlot {
        /// Position of the slot in the guess vector
        position: usize,
        /// Parameter kind name
        kind: &'static str,
        /// Description of the violation
        reason: String,
    },
    /// The cost function produced NaN or infinity
    #[error("Cost function returned a non-finite value: {0}")]
    NonFiniteCost(f64),
    /// The numerical optimizer failed for a reason of its own
    #[error("Optimizer error: {0}")]
    Optimizer(String),
}

/// Type alias for fitting results
pub type Result<T> = std::result::Result<T, FitError>;

impl From<argmin::core::Error> for FitError {
    fn from(err: argmin::core::Error) -> Self {
        match err.downcast::<FitError>() {
            Ok(fit_err) => fit_err,
            Err(other) => FitError::Optimizer(other.to_string()),
        }
    }
}
