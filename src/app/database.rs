// Shared SQLite handle for the task and account stores
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::app::error::{Result, TodoError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS account (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    Anonymous TINYINT NOT NULL,
    Email TEXT UNIQUE,
    Salt TEXT,
    PasswordHash TEXT,
    CreatedAt DATETIME NOT NULL
);
CREATE TABLE IF NOT EXISTS session (
    Key TEXT PRIMARY KEY,
    AccountId INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS task_item (
    Id INTEGER PRIMARY KEY AUTOINCREMENT,
    UserId TEXT NOT NULL,
    Title TEXT NOT NULL,
    Description TEXT NOT NULL,
    Url TEXT NOT NULL,
    DueDate TEXT NOT NULL,
    DueTime TEXT NOT NULL,
    Priority TEXT NOT NULL,
    Flag TINYINT NOT NULL,
    Completed TINYINT NOT NULL
);
CREATE INDEX IF NOT EXISTS task_item_user ON task_item (UserId);
";

/// Cloneable handle to one SQLite connection.
///
/// Statements run on tokio's blocking pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // Run a closure against the connection on the blocking pool
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| TodoError::Worker("database lock poisoned".to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| TodoError::Worker(e.to_string()))?
    }
}
