use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::EnquiryStatus;

/// Domain errors surfaced by every workflow operation.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),
    #[error("Cannot move enquiry from {from} to {to}")]
    IllegalTransition {
        from: EnquiryStatus,
        to: EnquiryStatus,
    },
    #[error("{0}")]
    Forbidden(String),
    #[error("Query {0} has already been responded to")]
    AlreadyResponded(Uuid),
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for WorkflowError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => WorkflowError::NotFound {
                entity: entity_type,
                id,
            },
            DatabaseError::ConstraintViolation(detail) => WorkflowError::Conflict(detail),
            other => WorkflowError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(err: rusqlite::Error) -> Self {
        WorkflowError::Database(DatabaseError::Sqlite(err))
    }
}
