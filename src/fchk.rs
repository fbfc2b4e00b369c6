//! Parser for Gaussian formatted checkpoint (`.fchk`) files.
//!
//! Only four records are read from the file:
//!
//! - `Number of atoms` (scalar, the last token on the line)
//! - `Current cartesian coordinates` (Bohr)
//! - `Cartesian Force Constants` (Hartree/Bohr², lower triangle)
//! - `Cartesian Gradient` (Hartree/Bohr)
//!
//! # Block termination
//!
//! An array record starts at its header line and continues over every
//! following line whose first character is a space. The first line that does
//! not start with a space ends the block and is itself examined as a possible
//! header. This is a heuristic, so the collected lengths are always checked
//! against the counts implied by the atom count (and against the `N=` count
//! printed on the header, when present). Any mismatch is a hard error.
//!
//! ```text
//! Number of atoms                            I                2
//! Current cartesian coordinates              R   N=           6
//!   0.00000000E+00  0.00000000E+00  0.00000000E+00  0.00000000E+00  0.00000000E+00
//!   1.40000000E+00
//! ```

use lazy_static::lazy_static;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Substring identifying the atom-count line
pub const ATOM_COUNT_MARKER: &str = "Number of atoms";
/// Substring identifying the coordinate block header
pub const COORDINATES_MARKER: &str = "Current cartesian coordinates";
/// Substring identifying the Hessian block header
pub const HESSIAN_MARKER: &str = "Cartesian Force Constants";
/// Substring identifying the gradient block header
pub const GRADIENT_MARKER: &str = "Cartesian Gradient";

/// Error type for checkpoint parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The checkpoint file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// No line contains the atom-count marker
    #[error("Parse error: no 'Number of atoms' line found")]
    MissingAtomCount,
    /// The atom-count line does not end in an integer
    #[error("Parse error: invalid atom count line '{0}'")]
    InvalidAtomCount(String),
    /// A block header is followed by no data lines
    #[error("Parse error: block '{0}' has no data lines")]
    EmptyBlock(&'static str),
    /// A block holds the wrong number of values for the atom count
    #[error("Parse error: block '{block}' expected {expected} values, found {found}")]
    ElementCount {
        /// Block marker
        block: &'static str,
        /// Count implied by the atom count
        expected: usize,
        /// Count actually read
        found: usize,
    },
    /// A block holds a different number of values than its header declares
    #[error("Parse error: block '{block}' declares N={declared} but holds {found} values")]
    DeclaredLength {
        /// Block marker
        block: &'static str,
        /// Count printed on the header line
        declared: usize,
        /// Count actually read
        found: usize,
    },
    /// A token inside a block is not a floating-point number
    #[error("Parse error: invalid number '{token}' in block '{block}'")]
    InvalidNumber {
        /// Block marker
        block: &'static str,
        /// Offending token
        token: String,
    },
}

/// Type alias for parse results
type Result<T> = std::result::Result<T, ParseError>;

lazy_static! {
    // Array header tail: "Cartesian Gradient                         R   N=           6"
    static ref ARRAY_HEADER_RE: Regex = Regex::new(r"\s[IR]\s+N=\s*(\d+)\s*$").unwrap();
}

/// The array records the parser collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Coordinates,
    Hessian,
    Gradient,
}

impl Block {
    const ALL: [Block; 3] = [Block::Coordinates, Block::Hessian, Block::Gradient];

    fn marker(self) -> &'static str {
        match self {
            Block::Coordinates => COORDINATES_MARKER,
            Block::Hessian => HESSIAN_MARKER,
            Block::Gradient => GRADIENT_MARKER,
        }
    }

    fn slot(self) -> usize {
        match self {
            Block::Coordinates => 0,
            Block::Hessian => 1,
            Block::Gradient => 2,
        }
    }

    fn from_header(line: &str) -> Option<Block> {
        Block::ALL.into_iter().find(|b| line.contains(b.marker()))
    }
}

/// Tokens collected for one block.
#[derive(Debug, Default)]
struct BlockBuffer {
    seen: bool,
    data_lines: usize,
    declared: Option<usize>,
    values: Vec<f64>,
}

/// Scanner state: either between records or inside an array record.
#[derive(Debug, Clone, Copy)]
enum ScanState {
    Outside,
    Inside(Block),
}

/// Termination predicate for array records.
fn is_block_continuation(line: &str) -> bool {
    line.starts_with(' ')
}

/// Raw scan output before reshaping.
#[derive(Debug)]
struct RawCheckpoint {
    atom_count: usize,
    blocks: [BlockBuffer; 3],
}

fn scan(text: &str) -> Result<RawCheckpoint> {
    let mut atom_count = None;
    let mut blocks: [BlockBuffer; 3] = Default::default();
    let mut state = ScanState::Outside;

    for line in text.lines() {
        if let ScanState::Inside(block) = state {
            if is_block_continuation(line) {
                let buffer = &mut blocks[block.slot()];
                buffer.data_lines += 1;
                for token in line.split_whitespace() {
                    let value = token.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                        block: block.marker(),
                        token: token.to_string(),
                    })?;
                    buffer.values.push(value);
                }
                continue;
            }
            state = ScanState::Outside;
        }

        if line.contains(ATOM_COUNT_MARKER) {
            let token = line
                .split_whitespace()
                .last()
                .ok_or_else(|| ParseError::InvalidAtomCount(line.to_string()))?;
            let count = token
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidAtomCount(line.to_string()))?;
            atom_count = Some(count);
        }

        if let Some(block) = Block::from_header(line) {
            let buffer = &mut blocks[block.slot()];
            buffer.seen = true;
            buffer.declared = ARRAY_HEADER_RE
                .captures(line)
                .and_then(|caps| caps[1].parse().ok());
            state = ScanState::Inside(block);
        }
    }

    let atom_count = atom_count.ok_or(ParseError::MissingAtomCount)?;

    for block in Block::ALL {
        let buffer = &blocks[block.slot()];
        if buffer.seen && buffer.data_lines == 0 {
            return Err(ParseError::EmptyBlock(block.marker()));
        }
        if let Some(declared) = buffer.declared {
            if declared != buffer.values.len() {
                return Err(ParseError::DeclaredLength {
                    block: block.marker(),
                    declared,
                    found: buffer.values.len(),
                });
            }
        }
        debug!(
            "fchk block '{}': {} lines, {} values",
            block.marker(),
            buffer.data_lines,
            buffer.values.len()
        );
    }

    Ok(RawCheckpoint { atom_count, blocks })
}

/// Reshape a flat row-major list into a `rows x cols` matrix.
pub fn fill_rows(values: &[f64], rows: usize, cols: usize, block: &'static str) -> Result<DMatrix<f64>> {
    let expected = rows * cols;
    if values.len() != expected {
        return Err(ParseError::ElementCount {
            block,
            expected,
            found: values.len(),
        });
    }
    Ok(DMatrix::from_row_slice(rows, cols, values))
}

/// Rebuild a symmetric `n x n` matrix from its row-major lower triangle.
///
/// Values are consumed in the order `(0,0), (1,0), (1,1), (2,0), ...` and
/// written to both `(i,j)` and `(j,i)`.
pub fn fill_lower_triangle(values: &[f64], n: usize, block: &'static str) -> Result<DMatrix<f64>> {
    let expected = n * (n + 1) / 2;
    if values.len() != expected {
        return Err(ParseError::ElementCount {
            block,
            expected,
            found: values.len(),
        });
    }

    let mut matrix = DMatrix::zeros(n, n);
    let (mut i, mut j) = (0, 0);
    for &value in values {
        if j > i {
            i += 1;
            j = 0;
        }
        matrix[(i, j)] = value;
        matrix[(j, i)] = value;
        j += 1;
    }
    Ok(matrix)
}

/// Data read from a formatted checkpoint file, in Hartree/Bohr units.
///
/// Created once by the parser and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    atom_count: usize,
    coordinates: DMatrix<f64>,
    hessian: DMatrix<f64>,
    gradient: DMatrix<f64>,
}

impl CheckpointRecord {
    /// Read and parse a formatted checkpoint file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let record: CheckpointRecord = content.parse()?;
        info!(
            "Read {} atoms and a {}x{} Hessian from {}",
            record.atom_count,
            record.hessian.nrows(),
            record.hessian.ncols(),
            path.display()
        );
        Ok(record)
    }

    /// Build a record from arrays already in memory (Bohr, Hartree/Bohr²,
    /// Hartree/Bohr). Shapes are checked against the coordinate row count.
    pub fn new(coordinates: DMatrix<f64>, hessian: DMatrix<f64>, gradient: DMatrix<f64>) -> Result<Self> {
        let n = coordinates.nrows();
        let checks = [
            (COORDINATES_MARKER, n * 3, coordinates.len()),
            (HESSIAN_MARKER, 9 * n * n, hessian.len()),
            (GRADIENT_MARKER, n * 3, gradient.len()),
        ];
        for (block, expected, found) in checks {
            if expected != found {
                return Err(ParseError::ElementCount { block, expected, found });
            }
        }
        let shapes = [
            (COORDINATES_MARKER, 3, coordinates.ncols()),
            (HESSIAN_MARKER, 3 * n, hessian.nrows()),
            (GRADIENT_MARKER, 3, gradient.ncols()),
        ];
        for (block, expected, found) in shapes {
            if expected != found {
                return Err(ParseError::ElementCount { block, expected, found });
            }
        }
        Ok(Self { atom_count: n, coordinates, hessian, gradient })
    }

    /// Number of atoms
    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Coordinates in Bohr, one row per atom
    pub fn coordinates(&self) -> &DMatrix<f64> {
        &self.coordinates
    }

    /// Symmetric Cartesian Hessian in Hartree/Bohr²
    pub fn hessian(&self) -> &DMatrix<f64> {
        &self.hessian
    }

    /// Cartesian gradient in Hartree/Bohr, one row per atom
    pub fn gradient(&self) -> &DMatrix<f64> {
        &self.gradient
    }

    /// Coordinates flattened as `[x1, y1, z1, x2, ...]`
    pub fn coordinates_flat(&self) -> DVector<f64> {
        flatten_rows(&self.coordinates)
    }

    /// Gradient flattened as `[gx1, gy1, gz1, gx2, ...]`
    pub fn gradient_flat(&self) -> DVector<f64> {
        flatten_rows(&self.gradient)
    }
}

impl FromStr for CheckpointRecord {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self> {
        let raw = scan(text)?;
        let n = raw.atom_count;
        let [coords, hessian, gradient] = &raw.blocks;

        Ok(Self {
            atom_count: n,
            coordinates: fill_rows(&coords.values, n, 3, COORDINATES_MARKER)?,
            hessian: fill_lower_triangle(&hessian.values, 3 * n, HESSIAN_MARKER)?,
            gradient: fill_rows(&gradient.values, n, 3, GRADIENT_MARKER)?,
        })
    }
}

fn flatten_rows(matrix: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_column_slice(matrix.transpose().as_slice())
}
