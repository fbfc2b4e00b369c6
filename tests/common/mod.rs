// Shared fixtures for integration tests.
#![allow(dead_code)]

use hessfit::engine::{ClassicalEngine, ForceFieldEngine};
use hessfit::topology::{Angle, AngleType, Atom, Bond, BondType, Dihedral, DihedralType, Topology};
use hessfit::units;
use nalgebra::{DMatrix, DVector};
use std::fmt::Write as _;

/// Format one fchk array record: header plus five values per line.
pub fn fchk_array(name: &str, values: &[f64]) -> String {
    let mut out = format!("{:<43}R   N={:>12}\n", name, values.len());
    for chunk in values.chunks(5) {
        for v in chunk {
            let _ = write!(out, " {:>23.15E}", v);
        }
        out.push('\n');
    }
    out
}

/// Build fchk text from coordinates (Bohr, flat), a full Hessian
/// (Hartree/Bohr²) and a gradient (Hartree/Bohr, flat).
pub fn fchk_text(coords_bohr: &[f64], hessian: &DMatrix<f64>, gradient: &[f64]) -> String {
    let n_atoms = coords_bohr.len() / 3;
    let mut lower = Vec::new();
    for i in 0..hessian.nrows() {
        for j in 0..=i {
            lower.push(hessian[(i, j)]);
        }
    }

    let mut text = String::from("Generated test checkpoint\nFreq      RB3LYP                                                      6-31G(d)\n");
    let _ = writeln!(text, "{:<43}I{:>17}", "Number of atoms", n_atoms);
    let _ = writeln!(text, "{:<43}I{:>17}", "Charge", 0);
    text.push_str(&fchk_array("Current cartesian coordinates", coords_bohr));
    text.push_str(&fchk_array("Cartesian Gradient", gradient));
    text.push_str(&fchk_array("Cartesian Force Constants", &lower));
    text.push_str(&fchk_array("Dipole Moment", &[0.0, 0.0, 0.0]));
    text
}

/// Render the engine's own Hessian and gradient as checkpoint text.
pub fn fchk_from_engine(engine: &ClassicalEngine) -> String {
    let coords_bohr = units::nm_to_bohr(engine.coordinates());
    let hessian = engine.get_hessian() / units::HESSIAN_FACTOR;
    let gradient = -engine.get_force() / units::GRADIENT_FACTOR;
    fchk_text(coords_bohr.as_slice(), &hessian, gradient.as_slice())
}

/// Four-atom chain with two bond types, two angle types and one torsion.
pub fn chain_topology() -> Topology {
    Topology {
        atoms: vec![
            Atom { name: "H1".into(), mass: 1.008 },
            Atom { name: "C1".into(), mass: 12.011 },
            Atom { name: "C2".into(), mass: 12.011 },
            Atom { name: "H2".into(), mass: 1.008 },
        ],
        bond_types: vec![BondType { k: 284512.0, req: 0.109 }, BondType { k: 259408.0, req: 0.1526 }],
        angle_types: vec![AngleType { k: 276.144, theteq: 110.7 }],
        dihedral_types: vec![DihedralType { phi_k: 0.6276, per: 3.0, phase: 0.0 }],
        bonds: vec![
            Bond { atoms: [0, 1], type_index: 0 },
            Bond { atoms: [1, 2], type_index: 1 },
            Bond { atoms: [2, 3], type_index: 0 },
        ],
        angles: vec![
            Angle { atoms: [0, 1, 2], type_index: 0 },
            Angle { atoms: [1, 2, 3], type_index: 0 },
        ],
        dihedrals: vec![Dihedral { atoms: [0, 1, 2, 3], type_index: 0 }],
    }
}

/// Chain geometry in nm, slightly away from equilibrium.
pub fn chain_coordinates() -> DVector<f64> {
    DVector::from_vec(vec![
        -0.040, 0.100, 0.010, //
        0.000, 0.000, 0.000, //
        0.150, 0.000, 0.000, //
        0.190, -0.095, 0.045,
    ])
}
