//! Cost function for parameter fitting.
//!
//! An [`EvaluationContext`] bundles the mutable engine with everything that
//! stays fixed during a fit: the slot layout, the reference coordinates, the
//! target state, the metric and the gradient weight. Each call to
//! [`EvaluationContext::evaluate`]:
//!
//! 1. decodes the trial vector into the engine's topology
//! 2. refreshes the engine and resets the reference coordinates
//! 3. evaluates the Hessian and force
//! 4. mass-weights and diagonalizes the Hessian
//! 5. scores the discrepancy and adds `k_gradient * RMSD(target_gradient, -force)`
//!
//! The engine's topology is overwritten on every call, so one context must
//! never be shared between concurrent evaluations.

use crate::config::Target;
use crate::engine::ForceFieldEngine;
use crate::error::{FitError, Result};
use crate::hessian::{self, TargetState};
use crate::metrics;
use crate::params::{self, ParameterSlot};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Terms of one cost evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Metric value (real part for the frequency metrics)
    pub discrepancy: f64,
    /// Unweighted RMSD between target gradient and trial gradient
    pub gradient_rmsd: f64,
    /// `discrepancy + k_gradient * gradient_rmsd`
    pub total: f64,
}

/// Mutable state and fixed inputs of the cost function.
pub struct EvaluationContext<'a, E: ForceFieldEngine> {
    engine: &'a mut E,
    slots: &'a [ParameterSlot],
    coordinates: &'a DVector<f64>,
    target: &'a TargetState,
    metric: Target,
    k_gradient: f64,
    evaluations: usize,
}

impl<'a, E: ForceFieldEngine> EvaluationContext<'a, E> {
    pub fn new(
        engine: &'a mut E,
        slots: &'a [ParameterSlot],
        coordinates: &'a DVector<f64>,
        target: &'a TargetState,
        metric: Target,
        k_gradient: f64,
    ) -> Self {
        Self {
            engine,
            slots,
            coordinates,
            target,
            metric,
            k_gradient,
            evaluations: 0,
        }
    }

    /// Evaluate every term of the cost at `vector`.
    pub fn evaluate(&mut self, vector: &[f64]) -> Result<CostBreakdown> {
        params::decode(self.slots, vector, self.engine.topology_mut())?;
        self.engine.update_topology()?;
        self.engine.set_coordinates(self.coordinates)?;

        let hessian = self.engine.get_hessian();
        let trial_gradient = -self.engine.get_force();
        let masses = self.engine.topology().masses();
        let trial = hessian::analyze(&hessian, &masses)?;

        let discrepancy = metrics::discrepancy(self.metric, &self.target.modes, &trial)?;
        let gradient_rmsd = metrics::rmsd(self.target.gradient.as_slice(), trial_gradient.as_slice())?;
        let total = discrepancy + self.k_gradient * gradient_rmsd;
        self.evaluations += 1;

        debug!(
            "eval {:>5}: {} = {:.8e}, gradient rmsd = {:.8e}, cost = {:.8e}",
            self.evaluations, self.metric, discrepancy, gradient_rmsd, total
        );

        if !total.is_finite() {
            return Err(FitError::NonFiniteCost(total));
        }
        Ok(CostBreakdown { discrepancy, gradient_rmsd, total })
    }

    /// Scalar cost at `vector`.
    pub fn cost(&mut self, vector: &[f64]) -> Result<f64> {
        Ok(self.evaluate(vector)?.total)
    }

    /// Number of evaluations so far
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn engine(&self) -> &E {
        &*self.engine
    }
}
