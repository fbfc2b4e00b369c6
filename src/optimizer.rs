use crate::config::{FitOptions, Method};
use crate::error::{FitError, Result};
use argmin::core::{CostFunction, Error, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use finitediff::FiniteDiff;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Relative displacement of each simplex vertex from `x0`
pub const SIMPLEX_RELATIVE_STEP: f64 = 0.05;
/// Displacement used instead when an `x0` entry is zero
pub const SIMPLEX_ZERO_STEP: f64 = 0.00025;
/// L-BFGS history length
pub const LBFGS_MEMORY: usize = 7;

/// Scalar cost the minimizer drives. Errors abort the run.
pub type CostFn<'c> = dyn FnMut(&[f64]) -> Result<f64> + 'c;

/// What a minimizer hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Best parameter vector found
    pub x: Vec<f64>,
    pub converged: bool,
    /// Cost at `x`
    pub cost: f64,
    pub iterations: u64,
    /// Human-readable termination reason
    pub termination: String,
}

/// A numerical minimizer over a flat parameter vector.
pub trait Minimizer {
    fn minimize(&self, cost: &mut CostFn<'_>, x0: &[f64], method: Method) -> Result<OptimizationResult>;
}

/// [`Minimizer`] backed by argmin's Nelder-Mead and L-BFGS solvers.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgminMinimizer {
    pub max_iters: u64,
    pub tolerance: f64,
}

impl Default for ArgminMinimizer {
    fn default() -> Self {
        Self::from_options(&FitOptions::default())
    }
}

impl ArgminMinimizer {
    pub fn new(max_iters: u64, tolerance: f64) -> Self {
        Self { max_iters, tolerance }
    }

    pub fn from_options(options: &FitOptions) -> Self {
        Self::new(options.max_iters, options.tolerance)
    }

    fn run_nelder_mead(&self, problem: CostAdapter<'_, '_>, x0: &[f64]) -> Result<OptimizationResult> {
        let solver = NelderMead::new(initial_simplex(x0)).with_sd_tolerance(self.tolerance)?;
        let executor = Executor::new(problem, solver).configure(|state| state.max_iters(self.max_iters));
        let mut state = executor.run()?.state().clone();
        finish(state.take_best_param(), state.get_best_cost(), state.get_iter(), state.get_termination_status())
    }

    fn run_lbfgs(&self, problem: CostAdapter<'_, '_>, x0: &[f64]) -> Result<OptimizationResult> {
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, LBFGS_MEMORY)
            .with_tolerance_grad(self.tolerance)?
            .with_tolerance_cost(self.tolerance)?;
        let executor = Executor::new(problem, solver)
            .configure(|state| state.param(x0.to_vec()).max_iters(self.max_iters));
        let mut state = executor.run()?.state().clone();
        finish(state.take_best_param(), state.get_best_cost(), state.get_iter(), state.get_termination_status())
    }
}

impl Minimizer for ArgminMinimizer {
    fn minimize(&self, cost: &mut CostFn<'_>, x0: &[f64], method: Method) -> Result<OptimizationResult> {
        if x0.is_empty() {
            let value = cost(x0)?;
            info!("Nothing to optimize: empty parameter vector, cost = {:.8e}", value);
            return Ok(OptimizationResult {
                x: Vec::new(),
                converged: true,
                cost: value,
                iterations: 0,
                termination: "empty parameter vector".to_string(),
            });
        }

        let problem = CostAdapter { cost: RefCell::new(cost) };
        let result = match method {
            Method::NelderMead => self.run_nelder_mead(problem, x0)?,
            Method::Lbfgs => self.run_lbfgs(problem, x0)?,
        };
        if !result.converged {
            warn!("{} stopped without converging: {}", method, result.termination);
        }
        Ok(result)
    }
}

fn finish(
    best: Option<Vec<f64>>,
    cost: f64,
    iterations: u64,
    status: &TerminationStatus,
) -> Result<OptimizationResult> {
    let x = best.ok_or_else(|| FitError::Optimizer("solver finished without a best parameter vector".into()))?;
    let converged = matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    );
    Ok(OptimizationResult {
        x,
        converged,
        cost,
        iterations,
        termination: format!("{:?}", status),
    })
}

/// `x0` plus one vertex per dimension with that entry displaced.
pub fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for i in 0..x0.len() {
        let mut vertex = x0.to_vec();
        vertex[i] = if vertex[i] != 0.0 {
            vertex[i] * (1.0 + SIMPLEX_RELATIVE_STEP)
        } else {
            SIMPLEX_ZERO_STEP
        };
        simplex.push(vertex);
    }
    simplex
}

/// Exposes a `FnMut` cost to argmin.
///
/// argmin evaluates through `&self`, so the closure sits in a `RefCell`.
/// Evaluations are strictly sequential; nothing re-enters the closure.
struct CostAdapter<'c, 'f> {
    cost: RefCell<&'c mut CostFn<'f>>,
}

impl CostFunction for CostAdapter<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, Error> {
        let mut f = self.cost.borrow_mut();
        Ok((*f)(param.as_slice())?)
    }
}

impl Gradient for CostAdapter<'_, '_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Central differences of the cost. The first failing evaluation is
    /// kept and returned instead of the NaN-filled gradient.
    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
        let failure: RefCell<Option<Error>> = RefCell::new(None);
        let f = |p: &Vec<f64>| -> f64 {
            match self.cost(p) {
                Ok(value) => value,
                Err(e) => {
                    let mut slot = failure.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    f64::NAN
                }
            }
        };
        let grad = param.central_diff(&f);
        match failure.into_inner() {
            Some(e) => Err(e),
            None => Ok(grad),
        }
    }
}
