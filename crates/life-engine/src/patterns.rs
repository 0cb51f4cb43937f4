//! Well-known starting patterns.

use crate::grid::Grid;

fn build(rows: &[&[u8]]) -> Grid {
    let cols = rows[0].len();
    let cells: Vec<u8> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    Grid::from_cells(rows.len(), cols, cells)
}

/// Vertical period-2 oscillator in a 5x5 grid.
pub fn blinker() -> Grid {
    build(&[
        &[0, 0, 0, 0, 0],
        &[0, 0, 1, 0, 0],
        &[0, 0, 1, 0, 0],
        &[0, 0, 1, 0, 0],
        &[0, 0, 0, 0, 0],
    ])
}

/// 2x2 still life centred in a 4x4 grid.
pub fn block() -> Grid {
    build(&[
        &[0, 0, 0, 0],
        &[0, 1, 1, 0],
        &[0, 1, 1, 0],
        &[0, 0, 0, 0],
    ])
}

/// Period-2 oscillator made of two diagonal blocks.
pub fn beacon() -> Grid {
    build(&[
        &[0, 0, 0, 0, 0, 0],
        &[0, 1, 1, 0, 0, 0],
        &[0, 1, 0, 0, 0, 0],
        &[0, 0, 0, 0, 1, 0],
        &[0, 0, 0, 1, 1, 0],
        &[0, 0, 0, 0, 0, 0],
    ])
}

pub fn toad() -> Grid {
    build(&[
        &[0, 0, 0, 0, 0, 0],
        &[0, 0, 1, 1, 1, 0],
        &[0, 1, 1, 1, 0, 0],
        &[0, 0, 0, 0, 0, 0],
    ])
}

/// Glider in a 5x5 grid; it runs into the border and settles.
pub fn glider() -> Grid {
    build(&[
        &[0, 0, 0, 0, 0],
        &[0, 0, 1, 0, 0],
        &[0, 0, 0, 1, 0],
        &[0, 1, 1, 1, 0],
        &[0, 0, 0, 0, 0],
    ])
}

/// Look a pattern up by name.
pub fn by_name(name: &str) -> Option<Grid> {
    match name {
        "blinker" => Some(blinker()),
        "block" => Some(block()),
        "beacon" => Some(beacon()),
        "toad" => Some(toad()),
        "glider" => Some(glider()),
        _ => None,
    }
}

pub const NAMES: [&str; 5] = ["blinker", "block", "beacon", "toad", "glider"];
