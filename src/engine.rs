//! Force-field evaluation behind the [`ForceFieldEngine`] trait.
//!
//! The fitter only needs energies, forces and a Cartesian Hessian at a fixed
//! geometry, plus a way to push edited parameters back into the engine. The
//! engine owns its topology; callers edit parameters through
//! [`ForceFieldEngine::topology_mut`] and must then call
//! [`ForceFieldEngine::update_topology`] before the next evaluation.
//!
//! [`ClassicalEngine`] evaluates AMBER-style bonded terms:
//!
//! - bonds: `E = k (r - req)^2`
//! - angles: `E = k (theta - theteq)^2`
//! - proper dihedrals: `E = phi_k (1 + cos(per * phi - phase))`
//!
//! Gradients are analytical. The Hessian is built by central differences of
//! the analytical gradient and symmetrized.
//!
//! Coordinates are flat `3N` vectors in nm, atom-major (`x0 y0 z0 x1 ...`).

use crate::topology::{Topology, TopologyError};
use nalgebra::{DMatrix, DVector, Vector3};
use thiserror::Error;

/// Displacement used for the finite-difference Hessian, nm
pub const HESSIAN_STEP_NM: f64 = 1.0e-5;

const MIN_SIN_THETA: f64 = 1.0e-8;
const MIN_CROSS_NORM_SQ: f64 = 1.0e-12;

/// Error type for force-field evaluation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Coordinate vector does not match the topology's atom count
    #[error("Coordinate length {found} does not match 3 x {atoms} atoms")]
    DimensionMismatch {
        /// Number of atoms in the topology
        atoms: usize,
        /// Length of the coordinate vector
        found: usize,
    },
    /// The edited topology is no longer consistent
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
}

/// Type alias for engine results
pub type Result<T> = std::result::Result<T, EngineError>;

/// Interface the fitter drives.
pub trait ForceFieldEngine {
    /// Current topology, including any edits not yet compiled
    fn topology(&self) -> &Topology;

    /// Mutable access for parameter edits; call [`update_topology`](Self::update_topology) afterwards
    fn topology_mut(&mut self) -> &mut Topology;

    /// Recompile derived state from the topology
    fn update_topology(&mut self) -> Result<()>;

    /// Set flat `3N` coordinates in nm
    fn set_coordinates(&mut self, coordinates: &DVector<f64>) -> Result<()>;

    /// Potential energy in kJ/mol
    fn get_energy(&self) -> f64;

    /// Negated gradient, kJ/mol/nm, flat `3N`
    fn get_force(&self) -> DVector<f64>;

    /// Cartesian Hessian, kJ/mol/nm², `3N x 3N`
    fn get_hessian(&self) -> DMatrix<f64>;
}

// Compiled terms carry radians and resolved parameters.
#[derive(Debug, Clone)]
struct BondTerm {
    i: usize,
    j: usize,
    k: f64,
    req: f64,
}

#[derive(Debug, Clone)]
struct AngleTerm {
    i: usize,
    j: usize,
    l: usize,
    k: f64,
    theteq: f64,
}

#[derive(Debug, Clone)]
struct DihedralTerm {
    atoms: [usize; 4],
    phi_k: f64,
    per: f64,
    phase: f64,
}

/// Bonded molecular-mechanics engine.
#[derive(Debug, Clone)]
pub struct ClassicalEngine {
    topology: Topology,
    coordinates: DVector<f64>,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    dihedrals: Vec<DihedralTerm>,
}

impl ClassicalEngine {
    /// Build an engine for `topology` at `coordinates` (flat, nm).
    pub fn new(topology: Topology, coordinates: DVector<f64>) -> Result<Self> {
        let mut engine = Self {
            topology,
            coordinates: DVector::zeros(0),
            bonds: Vec::new(),
            angles: Vec::new(),
            dihedrals: Vec::new(),
        };
        engine.update_topology()?;
        engine.set_coordinates(&coordinates)?;
        Ok(engine)
    }

    /// Current coordinates, nm
    pub fn coordinates(&self) -> &DVector<f64> {
        &self.coordinates
    }

    fn compile(&mut self) {
        let top = &self.topology;
        self.bonds = top
            .bonds
            .iter()
            .map(|b| {
                let t = &top.bond_types[b.type_index];
                BondTerm { i: b.atoms[0], j: b.atoms[1], k: t.k, req: t.req }
            })
            .collect();
        self.angles = top
            .angles
            .iter()
            .map(|a| {
                let t = &top.angle_types[a.type_index];
                AngleTerm {
                    i: a.atoms[0],
                    j: a.atoms[1],
                    l: a.atoms[2],
                    k: t.k,
                    theteq: t.theteq.to_radians(),
                }
            })
            .collect();
        self.dihedrals = top
            .dihedrals
            .iter()
            .map(|d| {
                let t = &top.dihedral_types[d.type_index];
                DihedralTerm { atoms: d.atoms, phi_k: t.phi_k, per: t.per, phase: t.phase.to_radians() }
            })
            .collect();
    }

    /// Energy and gradient at arbitrary coordinates.
    fn energy_and_gradient(&self, coords: &DVector<f64>) -> (f64, DVector<f64>) {
        let mut energy = 0.0;
        let mut grad = DVector::zeros(coords.len());

        for b in &self.bonds {
            let d = position(coords, b.i) - position(coords, b.j);
            let r = d.norm();
            energy += b.k * (r - b.req).powi(2);
            if r > 0.0 {
                let g = d * (2.0 * b.k * (r - b.req) / r);
                accumulate(&mut grad, b.i, &g);
                accumulate(&mut grad, b.j, &-g);
            }
        }

        for a in &self.angles {
            let u = position(coords, a.i) - position(coords, a.j);
            let v = position(coords, a.l) - position(coords, a.j);
            let (nu, nv) = (u.norm(), v.norm());
            if nu == 0.0 || nv == 0.0 {
                continue;
            }
            let cos = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
            let theta = cos.acos();
            energy += a.k * (theta - a.theteq).powi(2);

            let sin = (1.0 - cos * cos).sqrt();
            if sin < MIN_SIN_THETA {
                continue;
            }
            // dtheta/dx = -dcos/dx / sin
            let de_dtheta = 2.0 * a.k * (theta - a.theteq);
            let dcos_du = v / (nu * nv) - u * (cos / (nu * nu));
            let dcos_dv = u / (nu * nv) - v * (cos / (nv * nv));
            let gi = dcos_du * (-de_dtheta / sin);
            let gl = dcos_dv * (-de_dtheta / sin);
            accumulate(&mut grad, a.i, &gi);
            accumulate(&mut grad, a.l, &gl);
            accumulate(&mut grad, a.j, &-(gi + gl));
        }

        for t in &self.dihedrals {
            let [i, j, k, l] = t.atoms;
            let (xi, xj, xk, xl) = (position(coords, i), position(coords, j), position(coords, k), position(coords, l));
            let r_ij = xi - xj;
            let r_kj = xk - xj;
            let r_kl = xk - xl;
            let m = r_ij.cross(&r_kj);
            let n = r_kj.cross(&r_kl);
            let m2 = m.norm_squared();
            let n2 = n.norm_squared();
            let kj2 = r_kj.norm_squared();
            if m2 < MIN_CROSS_NORM_SQ || n2 < MIN_CROSS_NORM_SQ {
                continue;
            }
            let kj = kj2.sqrt();
            let phi = (kj * r_ij.dot(&n)).atan2(m.dot(&n));
            let arg = t.per * phi - t.phase;
            energy += t.phi_k * (1.0 + arg.cos());

            let de_dphi = -t.phi_k * t.per * arg.sin();
            let dphi_di = m * (kj / m2);
            let dphi_dl = n * (-kj / n2);
            let p = r_ij.dot(&r_kj) / kj2;
            let q = r_kl.dot(&r_kj) / kj2;
            let dphi_dj = dphi_di * (p - 1.0) - dphi_dl * q;
            let dphi_dk = dphi_dl * (q - 1.0) - dphi_di * p;
            accumulate(&mut grad, i, &(dphi_di * de_dphi));
            accumulate(&mut grad, j, &(dphi_dj * de_dphi));
            accumulate(&mut grad, k, &(dphi_dk * de_dphi));
            accumulate(&mut grad, l, &(dphi_dl * de_dphi));
        }

        (energy, grad)
    }
}

impl ForceFieldEngine for ClassicalEngine {
    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    fn update_topology(&mut self) -> Result<()> {
        self.topology.validate()?;
        self.compile();
        Ok(())
    }

    fn set_coordinates(&mut self, coordinates: &DVector<f64>) -> Result<()> {
        let atoms = self.topology.atom_count();
        if coordinates.len() != atoms * 3 {
            return Err(EngineError::DimensionMismatch { atoms, found: coordinates.len() });
        }
        self.coordinates = coordinates.clone();
        Ok(())
    }

    fn get_energy(&self) -> f64 {
        self.energy_and_gradient(&self.coordinates).0
    }

    fn get_force(&self) -> DVector<f64> {
        -self.energy_and_gradient(&self.coordinates).1
    }

    fn get_hessian(&self) -> DMatrix<f64> {
        let n = self.coordinates.len();
        let mut hessian = DMatrix::zeros(n, n);
        let mut displaced = self.coordinates.clone();
        for c in 0..n {
            let x = self.coordinates[c];
            displaced[c] = x + HESSIAN_STEP_NM;
            let plus = self.energy_and_gradient(&displaced).1;
            displaced[c] = x - HESSIAN_STEP_NM;
            let minus = self.energy_and_gradient(&displaced).1;
            displaced[c] = x;
            hessian.set_column(c, &((plus - minus) / (2.0 * HESSIAN_STEP_NM)));
        }
        (&hessian + hessian.transpose()) * 0.5
    }
}

fn position(coords: &DVector<f64>, atom: usize) -> Vector3<f64> {
    Vector3::new(coords[3 * atom], coords[3 * atom + 1], coords[3 * atom + 2])
}

fn accumulate(grad: &mut DVector<f64>, atom: usize, g: &Vector3<f64>) {
    for d in 0..3 {
        grad[3 * atom + d] += g[d];
    }
}
