pub mod house_store;

pub use house_store::HouseStore;

use crate::error::{HouseError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HouseError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Every game ever opened; amounts are base units as text
        conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                player TEXT NOT NULL,
                commit_hash TEXT NOT NULL,
                participation_fee TEXT NOT NULL,
                commit_block INTEGER NOT NULL,
                reveal_block INTEGER NOT NULL,
                user_move INTEGER NOT NULL,
                bot_move INTEGER NOT NULL,
                winner INTEGER NOT NULL,
                prize_money TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS active_games (
                player TEXT PRIMARY KEY,
                game_id INTEGER NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        // Single row
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total_balance TEXT NOT NULL,
                reserved TEXT NOT NULL,
                escrowed TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS reservations (
                game_id INTEGER PRIMARY KEY,
                max_payout TEXT NOT NULL,
                stake TEXT NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        // scope is '*' for the global index, otherwise the player address
        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                scope TEXT NOT NULL,
                position INTEGER NOT NULL,
                game_id INTEGER NOT NULL,
                PRIMARY KEY (scope, position)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chain (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                height INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                hash TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                block_height INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transfers (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                block_height INTEGER NOT NULL,
                recipient TEXT NOT NULL,
                amount TEXT NOT NULL,
                reason TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
