mod common;

use common::{chain_coordinates, chain_topology, fchk_from_engine, fchk_text};
use hessfit::cost::EvaluationContext;
use hessfit::engine::{ClassicalEngine, ForceFieldEngine};
use hessfit::fchk::ParseError;
use hessfit::hessian::{analyze, mass_weighted_hessian};
use hessfit::{units, CheckpointRecord, FitSession, Target};
use nalgebra::DMatrix;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_parse_file_from_disk() {
    let coords = [0.0, 0.0, 0.0, 0.0, 0.0, 1.4];
    let mut hessian = DMatrix::zeros(6, 6);
    for i in 0..6 {
        for j in 0..6 {
            hessian[(i, j)] = 0.01 * (1 + i.min(j)) as f64 + if i == j { 0.5 } else { 0.0 };
        }
    }
    let gradient = [0.0, 0.0, -0.02, 0.0, 0.0, 0.02];

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(fchk_text(&coords, &hessian, &gradient).as_bytes()).unwrap();

    let record = CheckpointRecord::from_file(file.path()).unwrap();
    assert_eq!(record.atom_count(), 2);
    assert_eq!(record.coordinates()[(1, 2)], 1.4);
    assert_eq!(record.gradient()[(0, 2)], -0.02);
    assert_eq!(record.hessian().nrows(), 6);
    for i in 0..6 {
        for j in 0..6 {
            assert!((record.hessian()[(i, j)] - hessian[(i, j)]).abs() < 1e-14);
            assert_eq!(record.hessian()[(i, j)], record.hessian()[(j, i)]);
        }
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CheckpointRecord::from_file(&dir.path().join("absent.fchk")).unwrap_err();
    assert!(matches!(err, ParseError::Io(_)));
}

#[test]
fn test_unit_hessian_two_atoms() {
    let text = fchk_text(&[0.0; 6], &DMatrix::identity(6, 6), &[0.0; 6]);
    let record: CheckpointRecord = text.parse().unwrap();

    let masses = [1.0, 1.0];
    let weighted = mass_weighted_hessian(record.hessian(), &masses).unwrap();
    assert_eq!(weighted, DMatrix::identity(6, 6));

    let modes = analyze(record.hessian(), &masses).unwrap();
    assert_eq!(modes.len(), 6);
    for value in modes.eigenvalues.iter() {
        assert!((value - 1.0).abs() < 1e-12);
    }

    let topology = hessfit::Topology {
        atoms: vec![
            hessfit::topology::Atom { name: "X1".into(), mass: 1.0 },
            hessfit::topology::Atom { name: "X2".into(), mass: 1.0 },
        ],
        ..Default::default()
    };
    let session = FitSession::new(record, &topology).unwrap();
    for value in session.target().eigenvalues().iter() {
        assert!((value / units::HESSIAN_FACTOR - 1.0).abs() < 1e-12);
    }
    assert!(session.target().gradient.iter().all(|g| *g == 0.0));
}

#[test]
fn test_engine_hessian_survives_text_round_trip() {
    let topology = chain_topology();
    let engine = ClassicalEngine::new(topology.clone(), chain_coordinates()).unwrap();
    let record: CheckpointRecord = fchk_from_engine(&engine).parse().unwrap();
    let session = FitSession::new(record, &topology).unwrap();

    let mut trial = ClassicalEngine::new(topology, session.coordinates().clone()).unwrap();
    let scale = session
        .target()
        .eigenvalues()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));

    let mut ctx = EvaluationContext::new(
        &mut trial,
        &[],
        session.coordinates(),
        session.target(),
        Target::Eigenvalues,
        1.0,
    );
    let breakdown = ctx.evaluate(&[]).unwrap();
    assert!(breakdown.discrepancy < 1e-8 * scale, "discrepancy {}", breakdown.discrepancy);
    assert!(breakdown.gradient_rmsd < 1e-6, "gradient rmsd {}", breakdown.gradient_rmsd);

    // The reference engine itself was untouched by parsing.
    assert!(engine.get_energy().is_finite());
}

#[test]
fn test_zero_atom_checkpoint_builds_empty_target() {
    let record: CheckpointRecord = "Number of atoms                            I                0\n".parse().unwrap();
    assert_eq!(record.atom_count(), 0);
    let session = FitSession::new(record, &hessfit::Topology::default()).unwrap();
    assert!(session.target().modes.is_empty());
    assert!(session.coordinates().is_empty());
}
