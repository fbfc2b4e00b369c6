//! Typed bonded force-field topology.
//!
//! Parameters live in type tables (`bond_types`, `angle_types`,
//! `dihedral_types`); connectivity lists (`bonds`, `angles`, `dihedrals`)
//! reference atoms by index and parameters by `type_index`. Several terms may
//! share one type, so changing a type changes every term that uses it.
//!
//! Units: nm, kJ/mol, amu, degrees.
//!
//! # Examples
//!
//! ```
//! use hessfit::topology::Topology;
//!
//! let json = r#"{
//!     "atoms": [{"name": "H1", "mass": 1.008}, {"name": "H2", "mass": 1.008}],
//!     "bond_types": [{"k": 250000.0, "req": 0.074}],
//!     "bonds": [{"atoms": [0, 1], "type_index": 0}]
//! }"#;
//! let topology = Topology::from_json_str(json).unwrap();
//! assert_eq!(topology.atom_count(), 2);
//! assert_eq!(topology.masses(), vec![1.008, 1.008]);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Error type for topology loading and validation.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// I/O error reading or writing the topology file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Atom mass is zero, negative or not finite
    #[error("Atom {index} ({name}) has invalid mass {mass}")]
    InvalidMass {
        /// Atom index
        index: usize,
        /// Atom name
        name: String,
        /// Offending mass
        mass: f64,
    },
    /// A term references an atom or type that does not exist
    #[error("{term} {index} references missing {what} {reference}")]
    DanglingReference {
        /// Term collection name
        term: &'static str,
        /// Term index within its collection
        index: usize,
        /// "atom" or "type"
        what: &'static str,
        /// The missing index
        reference: usize,
    },
}

/// Type alias for topology results
pub type Result<T> = std::result::Result<T, TopologyError>;

/// An atom with its mass in amu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub name: String,
    pub mass: f64,
}

/// Harmonic bond parameters: `E = k (r - req)^2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondType {
    /// Force constant, kJ/mol/nm²
    pub k: f64,
    /// Equilibrium length, nm
    pub req: f64,
}

/// Harmonic angle parameters: `E = k (theta - theteq)^2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleType {
    /// Force constant, kJ/mol/rad²
    pub k: f64,
    /// Equilibrium angle, degrees
    pub theteq: f64,
}

/// Periodic torsion parameters: `E = phi_k (1 + cos(per * phi - phase))`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DihedralType {
    /// Barrier height, kJ/mol
    pub phi_k: f64,
    /// Periodicity
    pub per: f64,
    /// Phase, degrees
    pub phase: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub atoms: [usize; 2],
    pub type_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    pub atoms: [usize; 3],
    pub type_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dihedral {
    pub atoms: [usize; 4],
    pub type_index: usize,
}

/// Complete bonded topology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub atoms: Vec<Atom>,
    #[serde(default)]
    pub bond_types: Vec<BondType>,
    #[serde(default)]
    pub angle_types: Vec<AngleType>,
    #[serde(default)]
    pub dihedral_types: Vec<DihedralType>,
    #[serde(default)]
    pub bonds: Vec<Bond>,
    #[serde(default)]
    pub angles: Vec<Angle>,
    #[serde(default)]
    pub dihedrals: Vec<Dihedral>,
}

impl Topology {
    /// Parse and validate a topology from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let topology: Topology = serde_json::from_str(json)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Load and validate a topology from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Write the topology as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Per-atom masses in amu, in atom order.
    pub fn masses(&self) -> Vec<f64> {
        self.atoms.iter().map(|a| a.mass).collect()
    }

    /// Check masses and that every term references existing atoms and types.
    pub fn validate(&self) -> Result<()> {
        for (index, atom) in self.atoms.iter().enumerate() {
            if !(atom.mass.is_finite() && atom.mass > 0.0) {
                return Err(TopologyError::InvalidMass {
                    index,
                    name: atom.name.clone(),
                    mass: atom.mass,
                });
            }
        }

        let n_atoms = self.atoms.len();
        check_terms("bond", self.bonds.iter().map(|b| (&b.atoms[..], b.type_index)), n_atoms, self.bond_types.len())?;
        check_terms("angle", self.angles.iter().map(|a| (&a.atoms[..], a.type_index)), n_atoms, self.angle_types.len())?;
        check_terms(
            "dihedral",
            self.dihedrals.iter().map(|d| (&d.atoms[..], d.type_index)),
            n_atoms,
            self.dihedral_types.len(),
        )?;
        Ok(())
    }
}

fn check_terms<'a>(
    term: &'static str,
    terms: impl Iterator<Item = (&'a [usize], usize)>,
    n_atoms: usize,
    n_types: usize,
) -> Result<()> {
    for (index, (atoms, type_index)) in terms.enumerate() {
        if let Some(&bad) = atoms.iter().find(|&&a| a >= n_atoms) {
            return Err(TopologyError::DanglingReference { term, index, what: "atom", reference: bad });
        }
        if type_index >= n_types {
            return Err(TopologyError::DanglingReference { term, index, what: "type", reference: type_index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn water() -> Topology {
        Topology {
            atoms: vec![
                Atom { name: "O".into(), mass: 15.999 },
                Atom { name: "H1".into(), mass: 1.008 },
                Atom { name: "H2".into(), mass: 1.008 },
            ],
            bond_types: vec![BondType { k: 231000.0, req: 0.0957 }],
            angle_types: vec![AngleType { k: 230.0, theteq: 104.5 }],
            bonds: vec![
                Bond { atoms: [0, 1], type_index: 0 },
                Bond { atoms: [0, 2], type_index: 0 },
            ],
            angles: vec![Angle { atoms: [1, 0, 2], type_index: 0 }],
            ..Default::default()
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("water.json");
        let top = water();
        top.save(&path).unwrap();
        let loaded = Topology::load(&path).unwrap();
        assert_eq!(loaded, top);
    }

    #[test]
    fn test_rejects_non_positive_mass() {
        let mut top = water();
        top.atoms[2].mass = 0.0;
        match top.validate() {
            Err(TopologyError::InvalidMass { index: 2, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_dangling_atom() {
        let mut top = water();
        top.angles[0].atoms[2] = 7;
        match top.validate() {
            Err(TopologyError::DanglingReference { term: "angle", what: "atom", reference: 7, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_dangling_type() {
        let mut top = water();
        top.bonds[1].type_index = 3;
        assert!(matches!(
            top.validate(),
            Err(TopologyError::DanglingReference { term: "bond", index: 1, what: "type", .. })
        ));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let top = Topology::from_json_str(r#"{"atoms": [{"name": "Ar", "mass": 39.948}]}"#).unwrap();
        assert!(top.bond_types.is_empty());
        assert!(top.dihedrals.is_empty());
    }
}
