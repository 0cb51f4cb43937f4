//! Conway's Game of Life transition rule.

use crate::grid::{Grid, ALIVE, DEAD};
use std::num::NonZeroU32;

/// Relative (row, col) offsets of the eight neighbours.
#[rustfmt::skip]
const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Compute the next generation.
///
/// Cells beyond the edge count as dead; the grid does not wrap.
pub fn next_state(grid: &Grid) -> Grid {
    let (rows, cols) = (grid.rows(), grid.cols());
    let mut cells = Vec::with_capacity(rows * cols);

    for row in 0..rows {
        for col in 0..cols {
            let neighbors = live_neighbors(grid, row, col);
            let next = match (grid.is_alive(row, col), neighbors) {
                (true, 2) | (true, 3) => ALIVE,
                (false, 3) => ALIVE,
                _ => DEAD,
            };
            cells.push(next);
        }
    }

    Grid::from_cells(rows, cols, cells)
}

/// Apply [`next_state`] `generations` times, without stability or cycle checks.
pub fn advance(grid: &Grid, generations: NonZeroU32) -> Grid {
    let mut current = next_state(grid);
    for _ in 1..generations.get() {
        current = next_state(&current);
    }
    current
}

fn live_neighbors(grid: &Grid, row: usize, col: usize) -> u8 {
    NEIGHBOR_OFFSETS
        .iter()
        .filter(|(dr, dc)| {
            match (row.checked_add_signed(*dr), col.checked_add_signed(*dc)) {
                (Some(r), Some(c)) => grid.is_alive(r, c),
                _ => false,
            }
        })
        .count() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns;
    use proptest::prelude::*;

    fn nz(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn test_single_dead_cell_stays_dead() {
        let grid = Grid::from_rows(vec![vec![0]]).unwrap();
        assert_eq!(next_state(&grid), grid);
    }

    #[test]
    fn test_lonely_cell_dies() {
        let grid = Grid::from_rows(vec![vec![1]]).unwrap();
        assert_eq!(next_state(&grid), Grid::from_rows(vec![vec![0]]).unwrap());
    }

    #[test]
    fn test_block_is_still_life() {
        let block = patterns::block();
        assert_eq!(next_state(&block), block);
    }

    #[test]
    fn test_block_against_edge_is_still_life() {
        let grid = Grid::from_rows(vec![vec![0, 1, 1, 0], vec![0, 1, 1, 0], vec![0, 0, 0, 0]])
            .unwrap();
        assert_eq!(next_state(&grid), grid);
    }

    #[test]
    fn test_blinker_rotates() {
        let vertical = patterns::blinker();
        let horizontal = Grid::from_rows(vec![
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0],
            vec![0, 1, 1, 1, 0],
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0],
        ])
        .unwrap();

        assert_eq!(next_state(&vertical), horizontal);
        assert_eq!(next_state(&horizontal), vertical);
        assert_eq!(advance(&vertical, nz(2)), vertical);
    }

    #[test]
    fn test_birth_needs_exactly_three() {
        // Corner cell (0,0) has three live neighbours and is born.
        let grid = Grid::from_rows(vec![vec![0, 1], vec![1, 1]]).unwrap();
        let next = next_state(&grid);
        assert!(next.is_alive(0, 0));
        assert_eq!(next.population(), 4);
    }

    #[test]
    fn test_overcrowded_cell_dies() {
        let grid = Grid::from_rows(vec![vec![1, 1, 1], vec![1, 1, 1], vec![1, 1, 1]]).unwrap();
        let next = next_state(&grid);
        assert!(!next.is_alive(1, 1));
        assert!(next.is_alive(0, 0));
    }

    #[test]
    fn test_advance_one_is_next_state() {
        let glider = patterns::glider();
        assert_eq!(advance(&glider, nz(1)), next_state(&glider));
    }

    #[test]
    fn test_glider_translates_after_four_generations() {
        let start = Grid::from_rows(vec![
            vec![0, 1, 0, 0, 0, 0],
            vec![0, 0, 1, 0, 0, 0],
            vec![1, 1, 1, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0],
        ])
        .unwrap();
        let shifted = Grid::from_rows(vec![
            vec![0, 0, 0, 0, 0, 0],
            vec![0, 0, 1, 0, 0, 0],
            vec![0, 0, 0, 1, 0, 0],
            vec![0, 1, 1, 1, 0, 0],
            vec![0, 0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0],
        ])
        .unwrap();
        assert_eq!(advance(&start, nz(4)), shifted);
    }

    fn grid_strategy() -> impl Strategy<Value = Grid> {
        (1usize..8, 1usize..8)
            .prop_flat_map(|(rows, cols)| {
                proptest::collection::vec(proptest::collection::vec(0u8..=1, cols), rows)
            })
            .prop_map(|rows| Grid::from_rows(rows).unwrap())
    }

    proptest! {
        #[test]
        fn prop_next_state_is_deterministic(grid in grid_strategy()) {
            prop_assert_eq!(next_state(&grid), next_state(&grid));
        }

        #[test]
        fn prop_dimensions_preserved(grid in grid_strategy()) {
            let next = next_state(&grid);
            prop_assert_eq!(next.rows(), grid.rows());
            prop_assert_eq!(next.cols(), grid.cols());
        }

        #[test]
        fn prop_lone_corner_cell_dies(size in 2usize..16) {
            let last = size - 1;
            for (row, col) in [(0, 0), (0, last), (last, 0), (last, last)] {
                let grid = Grid::dead(size, size).unwrap().with_cell(row, col, true).unwrap();
                prop_assert_eq!(next_state(&grid).population(), 0);
            }
        }
    }
}
