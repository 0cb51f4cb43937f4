//! Bounded 2D grid of live and dead cells.

use life_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const ALIVE: u8 = 1;
pub const DEAD: u8 = 0;

/// A rectangular, non-empty grid of binary cells.
///
/// Grids are only built through validating constructors, so every value of
/// this type has at least one row, at least one column, equal row lengths and
/// cells that are 0 or 1. On the wire a grid is an array of rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// Build a grid from row-major nested rows.
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self> {
        let height = rows.len();
        if height == 0 {
            return Err(Error::Validation("State can't be blank".to_string()));
        }

        let width = rows[0].len();
        if width == 0 {
            return Err(Error::Validation("State rows must not be empty".to_string()));
        }

        let mut cells = Vec::with_capacity(height * width);
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(Error::Validation(format!(
                    "State must be rectangular: row {} has {} cells, expected {}",
                    idx,
                    row.len(),
                    width
                )));
            }
            if row.iter().any(|&cell| cell > ALIVE) {
                return Err(Error::Validation("State must only contain 0s and 1s".to_string()));
            }
            cells.extend(row);
        }

        Ok(Self {
            rows: height,
            cols: width,
            cells,
        })
    }

    /// An all-dead grid of the given size.
    pub fn dead(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::Validation(format!(
                "Grid dimensions must be positive, got {}x{}",
                rows, cols
            )));
        }
        Ok(Self {
            rows,
            cols,
            cells: vec![DEAD; rows * cols],
        })
    }

    /// Crate-internal constructor for cell buffers already known to be valid.
    pub(crate) fn from_cells(rows: usize, cols: usize, cells: Vec<u8>) -> Self {
        debug_assert_eq!(cells.len(), rows * cols);
        Self { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell value at (row, col), or `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        if row < self.rows && col < self.cols {
            Some(self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    pub fn is_alive(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == Some(ALIVE)
    }

    /// Copy of this grid with one cell replaced.
    pub fn with_cell(&self, row: usize, col: usize, alive: bool) -> Result<Self> {
        if row >= self.rows || col >= self.cols {
            return Err(Error::Validation(format!(
                "Cell ({}, {}) is outside a {}x{} grid",
                row, col, self.rows, self.cols
            )));
        }
        let mut cells = self.cells.clone();
        cells[self.index(row, col)] = if alive { ALIVE } else { DEAD };
        Ok(Self::from_cells(self.rows, self.cols, cells))
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell == ALIVE).count()
    }

    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.cells.chunks(self.cols).map(<[u8]>::to_vec).collect()
    }

    /// Content hash over the dimensions and every cell.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update((self.rows as u64).to_le_bytes());
        hasher.update((self.cols as u64).to_le_bytes());
        hasher.update(&self.cells);
        Fingerprint(hasher.finalize().into())
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }
}

impl TryFrom<Vec<Vec<u8>>> for Grid {
    type Error = Error;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self> {
        Self::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<u8>> {
    fn from(grid: Grid) -> Self {
        grid.to_rows()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols) {
            for &cell in row {
                f.write_str(if cell == ALIVE { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// SHA-256 digest identifying a grid's exact contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
