//! Durable evolution runs: drives a stored board and records every generation.

use crate::database::Database;
use crate::record_histogram;
use life_core::{BoardId, Error, EvolutionConfig, Result};
use life_engine::{EvolutionDriver, GenerationSink, Grid, RunReport};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Writes each generation as a step row, refusing once the run is cancelled.
struct StepSink {
    db: Database,
    board_id: BoardId,
    cancel: CancellationToken,
}

impl GenerationSink for StepSink {
    async fn emit(&mut self, index: u64, grid: &Grid) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled(format!(
                "run for board {} cancelled before step {}",
                self.board_id, index
            )));
        }
        let result = self.db.insert_step(self.board_id, index, grid).await;

        // A board deleted mid-run fails its step insert; that run was cancelled, not broken.
        if let Err(Error::Database(reason)) = &result {
            if self.cancel.is_cancelled() || self.db.get_board(self.board_id).await?.is_none() {
                return Err(Error::Cancelled(format!(
                    "board {} removed during step {}: {}",
                    self.board_id, index, reason
                )));
            }
        }
        result
    }
}

pub struct EvolutionService {
    db: Database,
    config: RwLock<EvolutionConfig>,
}

impl EvolutionService {
    pub fn new(db: Database, config: EvolutionConfig) -> Self {
        Self {
            db,
            config: RwLock::new(config),
        }
    }

    fn driver(&self) -> EvolutionDriver {
        EvolutionDriver::new(self.config.read().max_attempts)
    }

    /// Evolve a stored board to completion and record its outcome.
    ///
    /// Returns `Ok(None)` without touching anything when the board is missing
    /// or already finished. Steps left by an earlier interrupted run are
    /// discarded first so generation numbers restart at 0.
    #[instrument(skip(self, cancel))]
    pub async fn evolve(
        &self,
        board_id: BoardId,
        cancel: CancellationToken,
    ) -> Result<Option<RunReport>> {
        let Some(board) = self.db.get_board(board_id).await? else {
            debug!("Board {} no longer exists", board_id);
            return Ok(None);
        };

        if board.status.is_terminal() {
            debug!("Board {} already finished as {}", board_id, board.status);
            return Ok(None);
        }

        let stale = self.db.clear_steps(board_id).await?;
        if stale > 0 {
            warn!("Discarded {} steps from an interrupted run of board {}", stale, board_id);
        }

        let driver = self.driver();
        debug!(
            "Evolving board {} for up to {} attempts",
            board_id,
            driver.max_attempts()
        );
        let mut sink = StepSink {
            db: self.db.clone(),
            board_id,
            cancel,
        };
        let report = driver.run(board.state, &mut sink).await?;

        if !self.db.finish_board(board_id, report.outcome.into()).await? {
            warn!("Board {} changed underneath its run; outcome not recorded", board_id);
        }

        record_histogram!(
            "evolution.generations",
            report.generations_emitted(),
            outcome = report.outcome.as_str()
        );
        info!(
            "Board {} finished as {} after {} generations",
            board_id,
            report.outcome,
            report.generations_emitted()
        );
        Ok(Some(report))
    }

    /// Final-state search for a grid without persisting anything.
    pub async fn settle(&self, grid: Grid) -> Result<RunReport> {
        self.driver().settle(grid).await
    }

    /// Get current configuration
    pub fn get_config(&self) -> EvolutionConfig {
        self.config.read().clone()
    }

    /// Update configuration; runs already in flight keep their bound.
    #[instrument(skip(self))]
    pub fn update_config(&self, config: EvolutionConfig) {
        *self.config.write() = config;
        info!("Configuration updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_core::{BoardStatus, RunOutcome};
    use life_engine::patterns;
    use std::num::NonZeroU32;

    async fn setup(max_attempts: u32) -> (Database, EvolutionService) {
        let db = Database::new(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        let config = EvolutionConfig {
            max_attempts: NonZeroU32::new(max_attempts).unwrap(),
        };
        (db.clone(), EvolutionService::new(db, config))
    }

    #[tokio::test]
    async fn test_blinker_persists_two_steps() {
        let (db, service) = setup(1000).await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();

        let report = service.evolve(id, CancellationToken::new()).await.unwrap().unwrap();

        assert_eq!(report.outcome, RunOutcome::Oscillating);
        assert_eq!(db.count_steps(id).await.unwrap(), 2);
        let step0 = db.get_step(id, 0).await.unwrap().unwrap();
        assert_eq!(step0.state, patterns::blinker());
        let board = db.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.status, BoardStatus::Oscillating);
    }

    #[tokio::test]
    async fn test_stable_board_persists_initial_only() {
        let (db, service) = setup(1000).await;
        let grid = Grid::from_rows(vec![vec![0, 1, 1, 0], vec![0, 1, 1, 0], vec![0, 0, 0, 0]])
            .unwrap();
        let id = db.create_board(&grid).await.unwrap();

        service.evolve(id, CancellationToken::new()).await.unwrap();

        assert_eq!(db.count_steps(id).await.unwrap(), 1);
        let board = db.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.status, BoardStatus::Stable);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_recorded() {
        let (db, service) = setup(3).await;
        let id = db.create_board(&patterns::glider()).await.unwrap();

        let report = service.evolve(id, CancellationToken::new()).await.unwrap().unwrap();

        assert_eq!(report.outcome, RunOutcome::BudgetExhausted);
        assert_eq!(db.count_steps(id).await.unwrap(), 4);
        let board = db.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.status, BoardStatus::MaxAttemptsReached);
    }

    #[tokio::test]
    async fn test_finished_board_is_not_rerun() {
        let (db, service) = setup(1000).await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();
        db.finish_board(id, BoardStatus::Stable).await.unwrap();

        let report = service.evolve(id, CancellationToken::new()).await.unwrap();

        assert!(report.is_none());
        assert_eq!(db.count_steps(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_board_is_skipped() {
        let (_db, service) = setup(1000).await;
        let report = service.evolve(BoardId(7), CancellationToken::new()).await.unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn test_interrupted_run_restarts_from_zero() {
        let (db, service) = setup(1000).await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();
        db.insert_step(id, 0, &patterns::blinker()).await.unwrap();
        db.insert_step(id, 1, &patterns::toad()).await.unwrap();

        service.evolve(id, CancellationToken::new()).await.unwrap();

        assert_eq!(db.count_steps(id).await.unwrap(), 2);
        let step1 = db.get_step(id, 1).await.unwrap().unwrap();
        assert_ne!(step1.state, patterns::toad());
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_board_processing() {
        let (db, service) = setup(1000).await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service.evolve(id, cancel).await;

        assert!(matches!(result, Err(Error::Cancelled(_))));
        let board = db.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.status, BoardStatus::Processing);
        assert_eq!(db.count_steps(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_step_for_deleted_board_counts_as_cancelled() {
        let (db, _service) = setup(1000).await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();
        assert!(db.delete_board(id).await.unwrap());

        let mut sink = StepSink {
            db: db.clone(),
            board_id: id,
            cancel: CancellationToken::new(),
        };
        let result = sink.emit(3, &patterns::blinker()).await;

        assert!(matches!(result, Err(Error::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_step_write_failure_for_live_board_is_an_error() {
        let (db, _service) = setup(1000).await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();
        db.insert_step(id, 0, &patterns::blinker()).await.unwrap();

        let mut sink = StepSink {
            db: db.clone(),
            board_id: id,
            cancel: CancellationToken::new(),
        };
        // Step 0 already exists, so the insert breaks the unique constraint.
        let result = sink.emit(0, &patterns::blinker()).await;

        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_update_config() {
        let (_db, service) = setup(1000).await;
        service.update_config(EvolutionConfig {
            max_attempts: NonZeroU32::new(5).unwrap(),
        });
        assert_eq!(service.get_config().max_attempts.get(), 5);
    }
}
