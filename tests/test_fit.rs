mod common;

use common::{chain_topology, fchk_from_engine, fchk_text};
use hessfit::cost::EvaluationContext;
use hessfit::engine::{ClassicalEngine, ForceFieldEngine};
use hessfit::fit::fit_files;
use hessfit::optimizer::{CostFn, Minimizer, OptimizationResult};
use hessfit::params::{decode, encode, FitFlags, ParameterKind};
use hessfit::topology::{Atom, Bond, BondType, Topology};
use hessfit::{CheckpointRecord, FitError, FitOptions, FitSession, Method, Target};
use nalgebra::{DMatrix, DVector};
use std::cell::Cell;
use std::fs;
use tempfile::tempdir;

/// Evaluates the cost once at the starting point and reports it.
struct SinglePoint {
    dims: Cell<Option<usize>>,
}

impl Minimizer for SinglePoint {
    fn minimize(&self, cost: &mut CostFn<'_>, x0: &[f64], _method: Method) -> hessfit::Result<OptimizationResult> {
        self.dims.set(Some(x0.len()));
        let value = cost(x0)?;
        Ok(OptimizationResult {
            x: x0.to_vec(),
            converged: true,
            cost: value,
            iterations: 0,
            termination: "single point".into(),
        })
    }
}

fn diatomic(k: f64) -> Topology {
    Topology {
        atoms: vec![Atom { name: "N1".into(), mass: 14.007 }, Atom { name: "N2".into(), mass: 14.007 }],
        bond_types: vec![BondType { k, req: 0.110 }],
        bonds: vec![Bond { atoms: [0, 1], type_index: 0 }],
        ..Default::default()
    }
}

#[test]
fn test_fit_without_parameters_matches_direct_evaluation() {
    let text = fchk_text(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0], &DMatrix::identity(6, 6), &[0.0; 6]);
    let record: CheckpointRecord = text.parse().unwrap();
    let topology = Topology {
        atoms: vec![Atom { name: "A".into(), mass: 1.0 }, Atom { name: "B".into(), mass: 1.0 }],
        ..diatomic(500.0)
    };
    let session = FitSession::new(record, &topology).unwrap();

    let mut direct_engine = ClassicalEngine::new(topology.clone(), session.coordinates().clone()).unwrap();
    let direct = EvaluationContext::new(
        &mut direct_engine,
        &[],
        session.coordinates(),
        session.target(),
        Target::Eigenvalues,
        0.5,
    )
    .evaluate(&[])
    .unwrap();

    let options = FitOptions {
        target: Target::Eigenvalues,
        k_gradient: 0.5,
        flags: FitFlags::none(),
        ..Default::default()
    };
    let minimizer = SinglePoint { dims: Cell::new(None) };
    let mut engine = ClassicalEngine::new(topology, session.coordinates().clone()).unwrap();
    let outcome = session.fit(&mut engine, &options, &minimizer).unwrap();

    assert_eq!(minimizer.dims.get(), Some(0));
    assert_eq!(outcome.result.cost, direct.total);
    assert_eq!(outcome.fitted, direct);
    assert!(direct.total > 0.0);
}

#[test]
fn test_fit_files_recovers_bond_constant() {
    let dir = tempdir().unwrap();
    let checkpoint = dir.path().join("n2.fchk");
    let topology_path = dir.path().join("n2.json");
    let coords = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.110, 0.0, 0.0]);

    let reference = ClassicalEngine::new(diatomic(2000.0), coords).unwrap();
    fs::write(&checkpoint, fchk_from_engine(&reference)).unwrap();
    diatomic(1200.0).save(&topology_path).unwrap();

    let options = FitOptions {
        method: Method::NelderMead,
        target: Target::Eigenvalues,
        k_gradient: 0.0,
        flags: FitFlags { bonds_k: true, ..FitFlags::none() },
        max_iters: 300,
        ..Default::default()
    };
    let (outcome, fitted) = fit_files(&checkpoint, &topology_path, &options).unwrap();

    assert!(outcome.fitted.total < outcome.initial.total);
    assert_eq!(outcome.slots.len(), 1);
    assert_eq!(outcome.slots[0].kind, ParameterKind::BondK);
    assert!((fitted.bond_types[0].k - 2000.0).abs() < 10.0, "k = {}", fitted.bond_types[0].k);
    assert_eq!(fitted.bond_types[0].req, 0.110);
}

#[test]
fn test_lbfgs_improves_chain_fit() {
    let topology = chain_topology();
    // equilibrium values are not fitted, so the optimum keeps a residual
    let mut shifted = topology.clone();
    shifted.bond_types[1].req = 0.150;
    shifted.dihedral_types[0].phi_k = 1.2;
    let reference = ClassicalEngine::new(shifted, common::chain_coordinates()).unwrap();
    let record: CheckpointRecord = fchk_from_engine(&reference).parse().unwrap();

    let mut start = topology.clone();
    start.bond_types[0].k *= 0.8;
    start.angle_types[0].k *= 1.3;
    let session = FitSession::new(record, &start).unwrap();
    let mut engine = ClassicalEngine::new(start, session.coordinates().clone()).unwrap();

    let options = FitOptions {
        method: Method::Lbfgs,
        target: Target::Eigenvalues,
        k_gradient: 0.0,
        flags: FitFlags { bonds_k: true, angles_k: true, ..FitFlags::none() },
        max_iters: 20,
        ..Default::default()
    };
    let minimizer = hessfit::optimizer::ArgminMinimizer::from_options(&options);
    let outcome = session.fit(&mut engine, &options, &minimizer).unwrap();

    assert_eq!(outcome.x0.len(), 3);
    assert!(outcome.fitted.total < outcome.initial.total);
    assert_eq!(engine.topology().bond_types[0].k, outcome.result.x[0]);
}

#[test]
fn test_codec_for_every_flag_combination() {
    let topology = chain_topology();
    let per_kind = [
        topology.bond_types.len(),
        topology.bond_types.len(),
        topology.angle_types.len(),
        topology.angle_types.len(),
        topology.dihedral_types.len(),
        topology.dihedral_types.len(),
    ];

    for bits in 0u8..64 {
        let flags = FitFlags::from_bits(bits);
        let (slots, x0) = encode(&topology, &flags);
        let expected: usize = (0..6).filter(|b| bits & (1 << b) != 0).map(|b| per_kind[b]).sum();
        assert_eq!(x0.len(), expected, "bits {:06b}", bits);
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.position, i);
        }

        let mut unchanged = topology.clone();
        decode(&slots, &x0, &mut unchanged).unwrap();
        assert_eq!(unchanged, topology);

        let shifted: Vec<f64> = x0.iter().map(|v| v + 1.0).collect();
        let mut edited = topology.clone();
        decode(&slots, &shifted, &mut edited).unwrap();
        assert_eq!(encode(&edited, &flags).1, shifted);
    }
}

#[test]
fn test_bad_settings_are_configuration_errors() {
    assert!(matches!("bogus".parse::<Target>(), Err(FitError::InvalidConfiguration(_))));
    assert!(matches!("slsqp".parse::<Method>(), Err(FitError::InvalidConfiguration(_))));

    let topology = diatomic(1000.0);
    let text = fchk_text(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0], &DMatrix::identity(6, 6), &[0.0; 6]);
    let session = FitSession::new(text.parse().unwrap(), &topology).unwrap();
    let mut engine = ClassicalEngine::new(topology, session.coordinates().clone()).unwrap();
    let options = FitOptions { tolerance: 0.0, ..Default::default() };
    let minimizer = SinglePoint { dims: Cell::new(None) };
    assert!(matches!(
        session.fit(&mut engine, &options, &minimizer),
        Err(FitError::InvalidConfiguration(_))
    ));
    assert_eq!(minimizer.dims.get(), None);
}
