//! Core type definitions for boards and evolution runs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a stored board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub i64);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an evolution run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The next generation equalled the current one.
    Stable,
    /// A generation repeated an earlier one.
    Oscillating,
    /// The iteration cap was hit before either of the above.
    #[serde(rename = "max_attempts_reached")]
    BudgetExhausted,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Stable => "stable",
            RunOutcome::Oscillating => "oscillating",
            RunOutcome::BudgetExhausted => "max_attempts_reached",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent status of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    Processing,
    Stable,
    Oscillating,
    MaxAttemptsReached,
}

impl BoardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardStatus::Processing => "processing",
            BoardStatus::Stable => "stable",
            BoardStatus::Oscillating => "oscillating",
            BoardStatus::MaxAttemptsReached => "max_attempts_reached",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BoardStatus::Processing)
    }
}

impl From<RunOutcome> for BoardStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Stable => BoardStatus::Stable,
            RunOutcome::Oscillating => BoardStatus::Oscillating,
            RunOutcome::BudgetExhausted => BoardStatus::MaxAttemptsReached,
        }
    }
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(BoardStatus::Processing),
            "stable" => Ok(BoardStatus::Stable),
            "oscillating" => Ok(BoardStatus::Oscillating),
            "max_attempts_reached" => Ok(BoardStatus::MaxAttemptsReached),
            other => Err(Error::InvalidState(format!("unknown board status '{}'", other))),
        }
    }
}
