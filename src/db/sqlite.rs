use std::path::Path;

use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::{CategoryBatch, DbError, Session, TABLE_NAME};

pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Session for SqliteSession {
    async fn table_exists(&mut self) -> Result<bool, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE_NAME],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    async fn create_table(&mut self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE scraped_data (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                category_name VARCHAR(255),
                link          TEXT,
                description   TEXT
            );
            ",
        )?;
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        batch: &CategoryBatch,
        inserted: &mut usize,
    ) -> Result<(), DbError> {
        // Dropping `tx` on an early return rolls the batch back.
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO scraped_data (category_name, link, description) VALUES (?1, ?2, ?3)",
            )?;
            for (name, link, description) in batch.rows() {
                stmt.execute(params![name, link, description])?;
                *inserted += 1;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn close(self) {
        match self.conn.close() {
            Ok(()) => info!("SQLite connection is closed."),
            Err((_, e)) => warn!("Failed to close SQLite connection: {}", e),
        }
    }
}
