//! Error types for gradebook-state

use thiserror::Error;

/// Errors that can occur while connecting to or preparing the database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Missing or malformed configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("project not found: {id}")]
    ProjectNotFound { id: i64 },

    #[error("evaluation not found: {id}")]
    EvaluationNotFound { id: i64 },

    #[error("grading criterion not found: {id}")]
    CriterionNotFound { id: i64 },

    #[error("project type not found: {id}")]
    ProjectTypeNotFound { id: i64 },

    #[error("defense day not found: {id}")]
    DefenseDayNotFound { id: i64 },

    #[error("defense slot not found: {id}")]
    SlotNotFound { id: i64 },

    #[error("registration not found: user {user_id} in slot {slot_id}")]
    RegistrationNotFound { slot_id: i64, user_id: i64 },

    /// A uniqueness rule was violated (by the application or a database index)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for every "record does not exist" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ProjectNotFound { .. }
                | StorageError::EvaluationNotFound { .. }
                | StorageError::CriterionNotFound { .. }
                | StorageError::ProjectTypeNotFound { .. }
                | StorageError::DefenseDayNotFound { .. }
                | StorageError::SlotNotFound { .. }
                | StorageError::RegistrationNotFound { .. }
        )
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        let message = err.to_string();
        // Unique index violations surface as "Database index `..` already contains .."
        if message.contains("already contains") {
            StorageError::Conflict(message)
        } else {
            StorageError::Backend(message)
        }
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
