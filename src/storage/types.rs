use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of herald appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A normalized article parsed from a feed entry, not yet stored.
///
/// The `identity` is already derived (see [`crate::feed::identify`]) so the
/// storage layer only ever deals in stable keys.
#[derive(Debug, Clone)]
pub struct ParsedArticle {
    pub identity: String,
    pub title: String,
    pub url: Option<String>,
    pub published: i64,
    pub image_url: Option<String>,
}

/// One known feed URL and its fetch status.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub added_at: i64,
    pub last_fetched: Option<i64>,
    pub error: Option<String>,
}

/// A stored article. Immutable once inserted; rows only ever disappear
/// when the garbage collector purges their whole site.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub site_id: i64,
    pub identity: String,
    pub title: String,
    pub url: Option<String>,
    pub published: i64,
    pub image_url: Option<String>,
    pub discovered_at: i64,
}
