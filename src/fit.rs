//! Fitting driver.
//!
//! A [`FitSession`] is built once from a parsed checkpoint and the topology
//! whose masses define the mass weighting. It holds the target state and the
//! reference geometry, and can run any number of fits against engines that
//! share that atom ordering.

use crate::config::FitOptions;
use crate::cost::{CostBreakdown, EvaluationContext};
use crate::engine::{ClassicalEngine, ForceFieldEngine};
use crate::error::{FitError, Result};
use crate::fchk::CheckpointRecord;
use crate::hessian::TargetState;
use crate::optimizer::{ArgminMinimizer, Minimizer, OptimizationResult};
use crate::params::{self, ParameterSlot};
use crate::topology::Topology;
use crate::units;
use log::{info, warn};
use nalgebra::DVector;
use std::path::Path;

/// Result of one fit.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// What the minimizer returned, untouched
    pub result: OptimizationResult,
    /// Slot layout of the guess vector
    pub slots: Vec<ParameterSlot>,
    /// Starting guess vector
    pub x0: Vec<f64>,
    /// Cost terms at `x0`
    pub initial: CostBreakdown,
    /// Cost terms at `result.x`
    pub fitted: CostBreakdown,
    /// Cost evaluations, including the two bookkeeping ones
    pub evaluations: usize,
}

/// Fixed inputs of a fit: the target state and the reference geometry.
#[derive(Debug, Clone)]
pub struct FitSession {
    record: CheckpointRecord,
    target: TargetState,
    coordinates: DVector<f64>,
}

impl FitSession {
    /// Convert the checkpoint to force-field units and build the target
    /// state using the masses of `topology`.
    pub fn new(record: CheckpointRecord, topology: &Topology) -> Result<Self> {
        let target = TargetState::from_checkpoint(&record, &topology.masses())?;
        let coordinates = units::bohr_to_nm(&record.coordinates_flat());
        info!(
            "Target state: {} atoms, eigenvalues {:.4e} .. {:.4e}",
            record.atom_count(),
            target.eigenvalues().iter().cloned().fold(f64::INFINITY, f64::min),
            target.eigenvalues().iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        );
        Ok(Self { record, target, coordinates })
    }

    pub fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    pub fn target(&self) -> &TargetState {
        &self.target
    }

    /// Reference coordinates in nm
    pub fn coordinates(&self) -> &DVector<f64> {
        &self.coordinates
    }

    /// Fit the parameters selected by `options.flags`.
    ///
    /// The engine's topology is edited in place on every evaluation. On
    /// success it is left holding the minimizer's best vector, already
    /// refreshed, so the fitted topology can be read straight from the
    /// engine.
    pub fn fit<E, M>(&self, engine: &mut E, options: &FitOptions, minimizer: &M) -> Result<FitOutcome>
    where
        E: ForceFieldEngine,
        M: Minimizer + ?Sized,
    {
        options.validate()?;
        let atoms = engine.topology().atom_count();
        if atoms != self.record.atom_count() {
            return Err(FitError::DimensionMismatch {
                context: "engine atoms vs checkpoint atoms",
                expected: self.record.atom_count(),
                found: atoms,
            });
        }
        if options.k_gradient == 0.0 {
            warn!("k_gradient is 0: the gradient term is computed but carries no weight");
        }

        let (slots, x0) = params::encode(engine.topology(), &options.flags);
        info!(
            "Fitting {} parameters: target = {}, method = {}, k_gradient = {}",
            x0.len(),
            options.target,
            options.method,
            options.k_gradient
        );

        let mut ctx = EvaluationContext::new(
            engine,
            &slots,
            &self.coordinates,
            &self.target,
            options.target,
            options.k_gradient,
        );
        let initial = ctx.evaluate(&x0)?;
        info!("Initial cost: {:.8e}", initial.total);

        let result = {
            let mut cost = |x: &[f64]| ctx.cost(x);
            minimizer.minimize(&mut cost, &x0, options.method)?
        };

        let fitted = ctx.evaluate(&result.x)?;
        let evaluations = ctx.evaluations();
        info!(
            "Fit finished after {} iterations ({} evaluations): cost {:.8e} -> {:.8e}, converged = {}",
            result.iterations, evaluations, initial.total, fitted.total, result.converged
        );

        Ok(FitOutcome { result, slots, x0, initial, fitted, evaluations })
    }
}

/// Load a checkpoint and a topology, fit with the classical engine and the
/// argmin minimizer, and return the outcome with the fitted topology.
pub fn fit_files(checkpoint: &Path, topology: &Path, options: &FitOptions) -> Result<(FitOutcome, Topology)> {
    let record = CheckpointRecord::from_file(checkpoint)?;
    let topology = Topology::load(topology)?;
    let session = FitSession::new(record, &topology)?;
    let mut engine = ClassicalEngine::new(topology, session.coordinates().clone())?;
    let outcome = session.fit(&mut engine, options, &ArgminMinimizer::from_options(options))?;
    Ok((outcome, engine.topology().clone()))
}
