//! Domain-level error taxonomy for Gradebook.

use gradebook_state::StorageError;

/// Gradebook domain errors.
#[derive(Debug, thiserror::Error)]
pub enum GradebookError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GradebookError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        GradebookError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for a missing entity, whether reported by a service check or by
    /// the store.
    pub fn is_not_found(&self) -> bool {
        match self {
            GradebookError::NotFound { .. } => true,
            GradebookError::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            GradebookError::Conflict(_) | GradebookError::Storage(StorageError::Conflict(_))
        )
    }
}

/// Result type for Gradebook domain operations.
pub type Result<T> = std::result::Result<T, GradebookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = GradebookError::not_found("Project", 9999);
        assert_eq!(err.to_string(), "Project with id 9999 not found");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_storage_not_found_counts_as_not_found() {
        let err = GradebookError::from(StorageError::RegistrationNotFound {
            slot_id: 1,
            user_id: 2,
        });
        assert!(err.is_not_found());
        assert!(err.to_string().contains("storage error"));
    }

    #[test]
    fn test_conflicts() {
        assert!(GradebookError::Conflict("dup".to_string()).is_conflict());
        assert!(GradebookError::from(StorageError::Conflict("idx".to_string())).is_conflict());
        assert!(!GradebookError::Validation("bad".to_string()).is_conflict());
    }

    #[test]
    fn test_backend_error_is_generic() {
        let err = GradebookError::from(StorageError::Backend("connection reset".to_string()));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("connection reset"));
    }
}
