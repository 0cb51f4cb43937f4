//! Background dispatch of evolution runs.

use crate::evolution::EvolutionService;
use crate::record_counter;
use dashmap::DashMap;
use life_core::{BoardId, Error, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub total_runs: usize,
    pub active_runs: usize,
    pub completed_runs: usize,
    pub cancelled_runs: usize,
    pub failed_runs: usize,
}

/// Runs at most one evolution per board, each on its own tokio task.
pub struct JobManager {
    active_runs: DashMap<BoardId, CancellationToken>,
    total_runs: RwLock<usize>,
    completed_runs: RwLock<usize>,
    cancelled_runs: RwLock<usize>,
    failed_runs: RwLock<usize>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            active_runs: DashMap::new(),
            total_runs: RwLock::new(0),
            completed_runs: RwLock::new(0),
            cancelled_runs: RwLock::new(0),
            failed_runs: RwLock::new(0),
        }
    }

    /// Start evolving a board in the background.
    ///
    /// Returns `None` if a run for this board is already active.
    #[instrument(skip(self, evolution))]
    pub fn dispatch(
        self: &Arc<Self>,
        board_id: BoardId,
        evolution: Arc<EvolutionService>,
    ) -> Option<JoinHandle<()>> {
        let cancel = CancellationToken::new();
        match self.active_runs.entry(board_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!("Board {} already has an active run", board_id);
                return None;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(cancel.clone());
            }
        }
        *self.total_runs.write() += 1;

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = evolution.evolve(board_id, cancel).await;
            manager.finish(board_id, result.map(|_| ()));
        });

        debug!("Dispatched run for board {}", board_id);
        Some(handle)
    }

    fn finish(&self, board_id: BoardId, result: Result<()>) {
        self.active_runs.remove(&board_id);
        match result {
            Ok(()) => {
                *self.completed_runs.write() += 1;
                record_counter!("runs.completed", 1);
            }
            Err(Error::Cancelled(reason)) => {
                *self.cancelled_runs.write() += 1;
                info!("Run for board {} stopped: {}", board_id, reason);
                record_counter!("runs.cancelled", 1);
            }
            Err(e) => {
                *self.failed_runs.write() += 1;
                error!("Run for board {} failed: {}", board_id, e);
                record_counter!("runs.failed", 1);
            }
        }
    }

    /// Signal the active run of a board to stop. Returns false if none is active.
    #[instrument(skip(self))]
    pub fn cancel(&self, board_id: BoardId) -> bool {
        match self.active_runs.get(&board_id) {
            Some(token) => {
                token.cancel();
                debug!("Cancellation requested for board {}", board_id);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, board_id: BoardId) -> bool {
        self.active_runs.contains_key(&board_id)
    }

    /// Re-dispatch boards left `processing` by a previous process.
    #[instrument(skip(self, evolution))]
    pub fn resume_pending(
        self: &Arc<Self>,
        evolution: Arc<EvolutionService>,
        pending: Vec<BoardId>,
    ) -> usize {
        let mut resumed = 0;
        for board_id in pending {
            if self.dispatch(board_id, evolution.clone()).is_some() {
                resumed += 1;
            }
        }
        if resumed > 0 {
            warn!("Resumed {} unfinished runs", resumed);
        }
        resumed
    }

    /// Cancel every active run, e.g. on shutdown.
    pub fn cancel_all(&self) {
        for entry in self.active_runs.iter() {
            entry.value().cancel();
        }
    }

    /// Get job statistics
    pub fn get_stats(&self) -> JobStats {
        JobStats {
            total_runs: *self.total_runs.read(),
            active_runs: self.active_runs.len(),
            completed_runs: *self.completed_runs.read(),
            cancelled_runs: *self.cancelled_runs.read(),
            failed_runs: *self.failed_runs.read(),
        }
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}
