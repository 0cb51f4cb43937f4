//! Validation of untrusted board states.

use crate::grid::Grid;
use life_core::{Error, Result};
use serde_json::Value;

/// Parse a client-supplied state into a [`Grid`].
///
/// The state must be a non-empty array of equally long, non-empty arrays
/// whose elements are the integers 0 or 1. The first problem found is
/// reported as [`Error::Validation`].
pub fn parse_state(state: &Value) -> Result<Grid> {
    let rows = match state {
        Value::Null => return Err(Error::Validation("State can't be blank".to_string())),
        Value::Array(rows) => rows,
        _ => return Err(Error::Validation("State must be an array".to_string())),
    };

    if rows.is_empty() {
        return Err(Error::Validation("State can't be blank".to_string()));
    }

    let mut parsed = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Array(cells) = row else {
            return Err(Error::Validation("State must be an array of arrays".to_string()));
        };
        parsed.push(parse_row(cells)?);
    }

    Grid::from_rows(parsed)
}

fn parse_row(cells: &[Value]) -> Result<Vec<u8>> {
    cells
        .iter()
        .map(|cell| match cell.as_u64() {
            Some(0) => Ok(0),
            Some(1) => Ok(1),
            _ => Err(Error::Validation("State must only contain 0s and 1s".to_string())),
        })
        .collect()
}
