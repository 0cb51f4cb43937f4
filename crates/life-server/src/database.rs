//! Database layer for persisting boards and their generations.

use chrono::{DateTime, TimeZone, Utc};
use life_core::{BoardId, BoardStatus, Error, Result};
use life_engine::Grid;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

const MEMORY: &str = ":memory:";

/// A stored board
#[derive(Debug, Clone, Serialize)]
pub struct BoardRecord {
    pub id: BoardId,
    pub state: Grid,
    pub status: BoardStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored generation of a board
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub board_id: BoardId,
    pub number: u64,
    pub state: Grid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        let in_memory = path == MEMORY;

        // Ensure parent directory exists
        if !in_memory {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))
            .map_err(|e| Error::Database(format!("Invalid database path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to ":memory:" opens its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS boards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                state TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'processing',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                board_id INTEGER NOT NULL REFERENCES boards(id),
                number INTEGER NOT NULL,
                state TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (board_id, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Insert a new board in `processing` status.
    pub async fn create_board(&self, state: &Grid) -> Result<BoardId> {
        let state_json = serde_json::to_string(state)?;
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO boards (state, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&state_json)
        .bind(BoardStatus::Processing.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::AlreadyExists("State has already been taken".to_string())
            }
            e => Error::Database(format!("Failed to create board: {}", e)),
        })?;

        Ok(BoardId(result.last_insert_rowid()))
    }

    pub async fn get_board(&self, board_id: BoardId) -> Result<Option<BoardRecord>> {
        let row = sqlx::query(
            "SELECT id, state, status, created_at, updated_at FROM boards WHERE id = ?1",
        )
        .bind(board_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get board: {}", e)))?;

        row.map(|row| board_from_row(&row)).transpose()
    }

    pub async fn list_boards(&self) -> Result<Vec<BoardRecord>> {
        let rows = sqlx::query(
            "SELECT id, state, status, created_at, updated_at FROM boards ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list boards: {}", e)))?;

        rows.iter().map(board_from_row).collect()
    }

    /// Boards whose evolution has not finished yet.
    pub async fn processing_boards(&self) -> Result<Vec<BoardId>> {
        let rows = sqlx::query("SELECT id FROM boards WHERE status = ?1 ORDER BY id")
            .bind(BoardStatus::Processing.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list processing boards: {}", e)))?;

        Ok(rows.iter().map(|row| BoardId(row.get("id"))).collect())
    }

    pub async fn count_boards(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM boards")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count boards: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count as usize)
    }

    /// Move a `processing` board to its final status.
    ///
    /// Returns false when the board is gone or already finished.
    pub async fn finish_board(&self, board_id: BoardId, status: BoardStatus) -> Result<bool> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE boards SET status = ?1, updated_at = ?2
            WHERE id = ?3 AND status = ?4
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(board_id.0)
        .bind(BoardStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update board status: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete a board and all of its steps. Returns false if it did not exist.
    pub async fn delete_board(&self, board_id: BoardId) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM steps WHERE board_id = ?1")
            .bind(board_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete steps: {}", e)))?;

        let result = sqlx::query("DELETE FROM boards WHERE id = ?1")
            .bind(board_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete board: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit delete: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn insert_step(&self, board_id: BoardId, number: u64, state: &Grid) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO steps (board_id, number, state, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(board_id.0)
        .bind(step_number(number)?)
        .bind(&state_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to store step {}: {}", number, e)))?;

        Ok(())
    }

    pub async fn get_step(&self, board_id: BoardId, number: u64) -> Result<Option<StepRecord>> {
        let row = sqlx::query(
            "SELECT board_id, number, state, created_at FROM steps WHERE board_id = ?1 AND number = ?2",
        )
        .bind(board_id.0)
        .bind(step_number(number)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get step: {}", e)))?;

        row.map(|row| step_from_row(&row)).transpose()
    }

    pub async fn count_steps(&self, board_id: BoardId) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM steps WHERE board_id = ?1")
            .bind(board_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count steps: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count as u64)
    }

    /// Remove steps left behind by an interrupted run.
    pub async fn clear_steps(&self, board_id: BoardId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM steps WHERE board_id = ?1")
            .bind(board_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to clear steps: {}", e)))?;

        Ok(result.rows_affected())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn step_number(number: u64) -> Result<i64> {
    i64::try_from(number)
        .map_err(|_| Error::Validation(format!("Step number {} is out of range", number)))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::Database(format!("Invalid timestamp: {}", secs)))
}

fn board_from_row(row: &SqliteRow) -> Result<BoardRecord> {
    let state: String = row.get("state");
    let status: String = row.get("status");

    Ok(BoardRecord {
        id: BoardId(row.get("id")),
        state: serde_json::from_str(&state)?,
        status: status.parse()?,
        created_at: timestamp(row.get("created_at"))?,
        updated_at: timestamp(row.get("updated_at"))?,
    })
}

fn step_from_row(row: &SqliteRow) -> Result<StepRecord> {
    let state: String = row.get("state");
    let number: i64 = row.get("number");

    Ok(StepRecord {
        board_id: BoardId(row.get("board_id")),
        number: number as u64,
        state: serde_json::from_str(&state)?,
        created_at: timestamp(row.get("created_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_engine::patterns;

    async fn create_test_db() -> Database {
        let db = Database::new(MEMORY).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_unusable_directory_is_io_error() {
        // The manifest is a file, so no directory can be created beneath it.
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml/life.db");
        let result = Database::new(path).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_store_and_retrieve_board() {
        let db = create_test_db().await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();

        let board = db.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.id, id);
        assert_eq!(board.state, patterns::blinker());
        assert_eq!(board.status, BoardStatus::Processing);

        assert!(db.get_board(BoardId(id.0 + 100)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_state_rejected() {
        let db = create_test_db().await;
        db.create_board(&patterns::block()).await.unwrap();

        let result = db.create_board(&patterns::block()).await;
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        assert_eq!(db.count_boards().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_boards() {
        let db = create_test_db().await;
        for grid in [patterns::blinker(), patterns::block(), patterns::toad()] {
            db.create_board(&grid).await.unwrap();
        }

        let boards = db.list_boards().await.unwrap();
        assert_eq!(boards.len(), 3);
        assert!(boards.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_steps_roundtrip_and_uniqueness() {
        let db = create_test_db().await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();

        db.insert_step(id, 0, &patterns::blinker()).await.unwrap();
        assert!(db.insert_step(id, 0, &patterns::blinker()).await.is_err());

        let step = db.get_step(id, 0).await.unwrap().unwrap();
        assert_eq!(step.number, 0);
        assert_eq!(step.state, patterns::blinker());
        assert!(db.get_step(id, 1).await.unwrap().is_none());
        assert_eq!(db.count_steps(id).await.unwrap(), 1);

        assert_eq!(db.clear_steps(id).await.unwrap(), 1);
        assert_eq!(db.count_steps(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_step_requires_existing_board() {
        let db = create_test_db().await;
        let result = db.insert_step(BoardId(42), 0, &patterns::block()).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_finish_board_only_once() {
        let db = create_test_db().await;
        let id = db.create_board(&patterns::block()).await.unwrap();
        assert_eq!(db.processing_boards().await.unwrap(), vec![id]);

        assert!(db.finish_board(id, BoardStatus::Stable).await.unwrap());
        assert!(!db.finish_board(id, BoardStatus::Oscillating).await.unwrap());

        let board = db.get_board(id).await.unwrap().unwrap();
        assert_eq!(board.status, BoardStatus::Stable);
        assert!(db.processing_boards().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_board_removes_steps() {
        let db = create_test_db().await;
        let id = db.create_board(&patterns::blinker()).await.unwrap();
        db.insert_step(id, 0, &patterns::blinker()).await.unwrap();

        assert!(db.delete_board(id).await.unwrap());
        assert!(db.get_board(id).await.unwrap().is_none());
        assert_eq!(db.count_steps(id).await.unwrap(), 0);
        assert!(!db.delete_board(id).await.unwrap());
    }
}
