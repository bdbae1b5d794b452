//! Error types for pgmapper

use thiserror::Error;

/// Result type alias for pgmapper operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapper operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// The backend connection could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement rejected by the backend
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Column value could not be decoded into a [`Value`](crate::Value)
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// The statement references a placeholder with no bound value
    #[error("No value bound for placeholder ':{placeholder}'")]
    BindingMismatch { placeholder: String },

    /// Invalid builder input (unknown scope, empty update, zero chunk size, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Relation name not declared on the model
    #[error("Relation '{relation}' is not declared on '{table}'")]
    UnknownRelation { table: String, relation: String },

    /// Transaction misuse (commit without begin, ...)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a binding mismatch error
    pub fn binding_mismatch(placeholder: impl Into<String>) -> Self {
        Self::BindingMismatch {
            placeholder: placeholder.into(),
        }
    }

    /// Create an unknown relation error
    pub fn unknown_relation(table: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            table: table.into(),
            relation: relation.into(),
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a binding mismatch error
    pub fn is_binding_mismatch(&self) -> bool {
        matches!(self, Self::BindingMismatch { .. })
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}
