//! Custom error types for the common library
//!
//! This module defines the storage error type shared by every store
//! implementation in the workspace.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A unique index rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The caller handed over a filter, sort or projection the store cannot run
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A stored row could not be mapped back into a domain value
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify a query error, surfacing unique index violations separately
    pub fn from_query(err: SqlxError) -> Self {
        match &err {
            SqlxError::Database(db) if db.is_unique_violation() => {
                let constraint = db.constraint().unwrap_or("unknown").to_string();
                DatabaseError::UniqueViolation(constraint)
            }
            _ => DatabaseError::Query(err),
        }
    }

    /// Whether this error is a unique index violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
