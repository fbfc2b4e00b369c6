//! Parameter codec: topology fields <-> flat guess vector.
//!
//! [`encode`] walks bond types, then angle types, then dihedral types in
//! index order. For each type it emits the enabled force-constant slot before
//! the enabled equilibrium slot, so the layout is fully determined by the
//! topology and the [`FitFlags`]. [`decode`] writes a vector back through the
//! same slots.
//!
//! Decoding only edits the topology. Engines keep compiled copies of the
//! parameters, so callers must refresh the engine after [`decode`]; see
//! [`crate::engine::ForceFieldEngine::update_topology`].

use crate::error::{FitError, Result};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which topology field a slot addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    BondK,
    BondReq,
    AngleK,
    AngleTheteq,
    DihedralPhiK,
    DihedralPhase,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::BondK => "bond_k",
            ParameterKind::BondReq => "bond_req",
            ParameterKind::AngleK => "angle_k",
            ParameterKind::AngleTheteq => "angle_theteq",
            ParameterKind::DihedralPhiK => "dihedral_phi_k",
            ParameterKind::DihedralPhase => "dihedral_phase",
        }
    }

    fn table_len(&self, topology: &Topology) -> usize {
        match self {
            ParameterKind::BondK | ParameterKind::BondReq => topology.bond_types.len(),
            ParameterKind::AngleK | ParameterKind::AngleTheteq => topology.angle_types.len(),
            ParameterKind::DihedralPhiK | ParameterKind::DihedralPhase => topology.dihedral_types.len(),
        }
    }

    /// Read the field. `type_index` must be in range.
    fn read(&self, topology: &Topology, type_index: usize) -> f64 {
        match self {
            ParameterKind::BondK => topology.bond_types[type_index].k,
            ParameterKind::BondReq => topology.bond_types[type_index].req,
            ParameterKind::AngleK => topology.angle_types[type_index].k,
            ParameterKind::AngleTheteq => topology.angle_types[type_index].theteq,
            ParameterKind::DihedralPhiK => topology.dihedral_types[type_index].phi_k,
            ParameterKind::DihedralPhase => topology.dihedral_types[type_index].phase,
        }
    }

    /// Overwrite the field. `type_index` must be in range.
    fn write(&self, topology: &mut Topology, type_index: usize, value: f64) {
        match self {
            ParameterKind::BondK => topology.bond_types[type_index].k = value,
            ParameterKind::BondReq => topology.bond_types[type_index].req = value,
            ParameterKind::AngleK => topology.angle_types[type_index].k = value,
            ParameterKind::AngleTheteq => topology.angle_types[type_index].theteq = value,
            ParameterKind::DihedralPhiK => topology.dihedral_types[type_index].phi_k = value,
            ParameterKind::DihedralPhase => topology.dihedral_types[type_index].phase = value,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tunable scalar: `kind` on type `type_index`, stored at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSlot {
    pub kind: ParameterKind,
    pub type_index: usize,
    pub position: usize,
}

/// Which parameter classes are fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitFlags {
    pub bonds_k: bool,
    pub bonds_req: bool,
    pub angles_k: bool,
    pub angles_theteq: bool,
    pub dihedrals_phi_k: bool,
    pub dihedrals_phase: bool,
}

impl Default for FitFlags {
    /// Force constants only.
    fn default() -> Self {
        Self {
            bonds_k: true,
            bonds_req: false,
            angles_k: true,
            angles_theteq: false,
            dihedrals_phi_k: true,
            dihedrals_phase: false,
        }
    }
}

impl FitFlags {
    pub fn none() -> Self {
        Self {
            bonds_k: false,
            bonds_req: false,
            angles_k: false,
            angles_theteq: false,
            dihedrals_phi_k: false,
            dihedrals_phase: false,
        }
    }

    pub fn all() -> Self {
        Self {
            bonds_k: true,
            bonds_req: true,
            angles_k: true,
            angles_theteq: true,
            dihedrals_phi_k: true,
            dihedrals_phase: true,
        }
    }

    /// Build from six bits in slot order (bit 0 = `bonds_k`).
    pub fn from_bits(bits: u8) -> Self {
        Self {
            bonds_k: bits & 1 != 0,
            bonds_req: bits & 2 != 0,
            angles_k: bits & 4 != 0,
            angles_theteq: bits & 8 != 0,
            dihedrals_phi_k: bits & 16 != 0,
            dihedrals_phase: bits & 32 != 0,
        }
    }

    fn kinds(&self) -> [(ParameterKind, bool); 6] {
        [
            (ParameterKind::BondK, self.bonds_k),
            (ParameterKind::BondReq, self.bonds_req),
            (ParameterKind::AngleK, self.angles_k),
            (ParameterKind::AngleTheteq, self.angles_theteq),
            (ParameterKind::DihedralPhiK, self.dihedrals_phi_k),
            (ParameterKind::DihedralPhase, self.dihedrals_phase),
        ]
    }
}

/// Enumerate enabled slots and read their current values.
pub fn encode(topology: &Topology, flags: &FitFlags) -> (Vec<ParameterSlot>, Vec<f64>) {
    let mut slots = Vec::new();
    let mut x0 = Vec::new();

    // kinds() lists each table's (k, equilibrium) pair adjacently
    for pair in flags.kinds().chunks(2) {
        for type_index in 0..pair[0].0.table_len(topology) {
            for &(kind, enabled) in pair {
                if enabled {
                    slots.push(ParameterSlot { kind, type_index, position: slots.len() });
                    x0.push(kind.read(topology, type_index));
                }
            }
        }
    }

    (slots, x0)
}

/// Write `vector` into `topology` through `slots`.
///
/// Fails without touching the topology if any slot is out of range.
pub fn decode(slots: &[ParameterSlot], vector: &[f64], topology: &mut Topology) -> Result<()> {
    for slot in slots {
        if slot.position >= vector.len() {
            return Err(FitError::InvalidSlot {
                position: slot.position,
                kind: slot.kind.as_str(),
                reason: format!("guess vector has only {} entries", vector.len()),
            });
        }
        let len = slot.kind.table_len(topology);
        if slot.type_index >= len {
            return Err(FitError::InvalidSlot {
                position: slot.position,
                kind: slot.kind.as_str(),
                reason: format!("type index {} but only {} types", slot.type_index, len),
            });
        }
    }

    for slot in slots {
        slot.kind.write(topology, slot.type_index, vector[slot.position]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{AngleType, BondType, DihedralType};

    fn tables() -> Topology {
        Topology {
            bond_types: vec![BondType { k: 1.0, req: 2.0 }, BondType { k: 3.0, req: 4.0 }],
            angle_types: vec![AngleType { k: 5.0, theteq: 6.0 }],
            dihedral_types: vec![DihedralType { phi_k: 7.0, per: 3.0, phase: 8.0 }],
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_order_all_flags() {
        let (slots, x0) = encode(&tables(), &FitFlags::all());
        assert_eq!(x0, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let kinds: Vec<_> = slots.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParameterKind::BondK,
                ParameterKind::BondReq,
                ParameterKind::BondK,
                ParameterKind::BondReq,
                ParameterKind::AngleK,
                ParameterKind::AngleTheteq,
                ParameterKind::DihedralPhiK,
                ParameterKind::DihedralPhase,
            ]
        );
        for (i, s) in slots.iter().enumerate() {
            assert_eq!(s.position, i);
        }
    }

    #[test]
    fn test_default_flags_pick_force_constants() {
        let (slots, x0) = encode(&tables(), &FitFlags::default());
        assert_eq!(x0, vec![1.0, 3.0, 5.0, 7.0]);
        assert_eq!(slots[1], ParameterSlot { kind: ParameterKind::BondK, type_index: 1, position: 1 });
    }

    #[test]
    fn test_no_flags_gives_empty_vector() {
        let (slots, x0) = encode(&tables(), &FitFlags::none());
        assert!(slots.is_empty());
        assert!(x0.is_empty());
    }

    #[test]
    fn test_decode_writes_fields() {
        let mut top = tables();
        let (slots, _) = encode(&top, &FitFlags::all());
        let v: Vec<f64> = (0..8).map(|i| 10.0 * i as f64).collect();
        decode(&slots, &v, &mut top).unwrap();
        assert_eq!(top.bond_types[1].req, 30.0);
        assert_eq!(top.angle_types[0].theteq, 50.0);
        assert_eq!(top.dihedral_types[0].phase, 70.0);
        assert_eq!(top.dihedral_types[0].per, 3.0);
    }

    #[test]
    fn test_decode_short_vector_is_rejected() {
        let mut top = tables();
        let (slots, _) = encode(&top, &FitFlags::all());
        let err = decode(&slots, &[0.0; 3], &mut top).unwrap_err();
        assert!(matches!(err, FitError::InvalidSlot { position: 3, .. }));
        assert_eq!(top, tables());
    }

    #[test]
    fn test_kind_names_match_serde() {
        let json = serde_json::to_string(&ParameterKind::DihedralPhiK).unwrap();
        assert_eq!(json, "\"dihedral_phi_k\"");
        assert_eq!(ParameterKind::AngleTheteq.to_string(), "angle_theteq");
    }
}
