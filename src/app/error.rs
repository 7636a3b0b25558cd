// Error types shared by the collaborators and view-models

/// Everything that can go wrong while talking to storage or the account backend.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An update referenced a task that does not exist for the current user.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A user-scoped operation ran while nobody was signed in.
    #[error("no signed-in user")]
    NoUser,

    /// Account backend failure.
    #[error("account error: {0}")]
    Account(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking database worker panicked or its lock was poisoned.
    #[error("worker error: {0}")]
    Worker(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TodoError>;
