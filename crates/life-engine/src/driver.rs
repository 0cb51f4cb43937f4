//! Bounded evolution loop with stability and cycle detection.

use crate::grid::{Fingerprint, Grid};
use crate::step::next_state;
use life_core::{Result, RunOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use tracing::{debug, instrument, trace};

/// Generations computed between cooperative yields to the async runtime.
const YIELD_INTERVAL: u64 = 32;

/// One emitted generation of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub index: u64,
    pub grid: Grid,
}

/// Receives every generation a run produces, in order.
///
/// The driver awaits each `emit` before computing the next generation. An
/// error aborts the run and is returned from [`EvolutionDriver::run`] as is;
/// return [`life_core::Error::Cancelled`] to stop a run early.
pub trait GenerationSink {
    fn emit(&mut self, index: u64, grid: &Grid) -> impl Future<Output = Result<()>> + Send;
}

impl GenerationSink for Vec<Generation> {
    async fn emit(&mut self, index: u64, grid: &Grid) -> Result<()> {
        self.push(Generation {
            index,
            grid: grid.clone(),
        });
        Ok(())
    }
}

/// Sink that keeps nothing, for one-shot final-state queries.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl GenerationSink for Discard {
    async fn emit(&mut self, _index: u64, _grid: &Grid) -> Result<()> {
        Ok(())
    }
}

/// Where a detected cycle starts and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    /// Generation index at which the repeated grid first appeared
    pub first_seen: u64,
    /// Number of generations between repeats
    pub period: u64,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Index of the last generation handed to the sink
    pub last_generation: u64,
    /// Final grid: the stable or last computed grid, or the grid that closed the cycle
    pub terminal: Grid,
    pub cycle: Option<Cycle>,
    /// Attempt budget the run was bounded by
    pub max_attempts: NonZeroU32,
}

impl RunReport {
    /// Number of generations emitted, including generation 0.
    pub fn generations_emitted(&self) -> u64 {
        self.last_generation + 1
    }
}

/// Drives a grid forward until it settles, repeats, or runs out of attempts.
#[derive(Debug, Clone, Copy)]
pub struct EvolutionDriver {
    max_attempts: NonZeroU32,
}

impl EvolutionDriver {
    pub fn new(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Evolve `initial`, emitting generation 0 and every new generation after it.
    ///
    /// A generation equal to its predecessor ends the run as stable, and one
    /// matching any earlier generation ends it as oscillating; neither is
    /// emitted. Generation indices reach the sink gap-free starting at 0.
    #[instrument(skip(self, initial, sink), fields(
        rows = initial.rows(),
        cols = initial.cols(),
        max_attempts = self.max_attempts.get(),
    ))]
    pub async fn run<S>(&self, initial: Grid, sink: &mut S) -> Result<RunReport>
    where
        S: GenerationSink + Send,
    {
        sink.emit(0, &initial).await?;

        let mut seen: HashMap<Fingerprint, u64> = HashMap::new();
        seen.insert(initial.fingerprint(), 0);
        let mut current = initial;
        let mut last_generation = 0;

        for step in 1..=u64::from(self.max_attempts.get()) {
            let candidate = next_state(&current);

            if candidate == current {
                debug!(generation = last_generation, "Reached a still life");
                return Ok(RunReport {
                    outcome: RunOutcome::Stable,
                    last_generation,
                    terminal: current,
                    cycle: None,
                    max_attempts: self.max_attempts,
                });
            }

            let fingerprint = candidate.fingerprint();
            if let Some(&first_seen) = seen.get(&fingerprint) {
                let cycle = Cycle {
                    first_seen,
                    period: step - first_seen,
                };
                debug!(
                    first_seen,
                    period = cycle.period,
                    "Generation {} repeats an earlier one",
                    step
                );
                return Ok(RunReport {
                    outcome: RunOutcome::Oscillating,
                    last_generation,
                    terminal: candidate,
                    cycle: Some(cycle),
                    max_attempts: self.max_attempts,
                });
            }

            sink.emit(step, &candidate).await?;
            trace!(generation = step, %fingerprint, population = candidate.population());
            seen.insert(fingerprint, step);
            current = candidate;
            last_generation = step;

            // Let other tasks run when the sink never suspends.
            if step % YIELD_INTERVAL == 0 {
                tokio::task::yield_now().await;
            }
        }

        debug!(generation = last_generation, "Attempt budget exhausted");
        Ok(RunReport {
            outcome: RunOutcome::BudgetExhausted,
            last_generation,
            terminal: current,
            cycle: None,
            max_attempts: self.max_attempts,
        })
    }

    /// Search for a final state without recording generations.
    pub async fn settle(&self, initial: Grid) -> Result<RunReport> {
        self.run(initial, &mut Discard).await
    }
}
