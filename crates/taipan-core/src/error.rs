//! Error types for the TaipanDB library.

use std::path::PathBuf;

use thiserror::Error;

/// Comprehensive error type for all survey database operations.
#[derive(Error, Debug)]
pub enum TaipanError {
    /// Database driver errors, passed through with a context message
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Malformed condition descriptors or predicate trees
    #[error("Invalid condition: {reason}")]
    InvalidCondition { reason: String },
    /// A declared column type with no entry in the type mapping table
    #[error("Unknown column type '{declared}' for {table}.{column}")]
    UnknownType {
        table: String,
        column: String,
        declared: String,
    },
    /// Row/column shape mismatches in batch operations
    #[error("Shape mismatch: {reason}")]
    Shape { reason: String },
    /// Primary-key layout violations detected before execution
    #[error("Constraint violated: {reason}")]
    Constraint { reason: String },
    /// Adjacent tables in a join share no key column
    #[error("No common join column between '{left}' and '{right}'")]
    NoJoinColumn { left: String, right: String },
    /// The table is not present in the schema
    #[error("Table '{table}' does not exist")]
    UnknownTable { table: String },
    /// The column is not present in any of the referenced tables
    #[error("Column '{column}' does not exist in {table}")]
    UnknownColumn { table: String, column: String },
    /// Field IDs requested by the caller that are absent from the database
    #[error("Field IDs not present in the database: {ids:?}")]
    UnknownField { ids: Vec<i64> },
    /// Stored rows that contradict each other
    #[error("Data integrity violation: {reason}")]
    DataIntegrity { reason: String },
    /// Catalogue file parse failures
    #[error("Catalogue error in '{path}' line {line}: {reason}")]
    Ingest {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    /// Table definition file parse failures
    #[error("Table definition '{table}' line {line}: {reason}")]
    Definition {
        table: String,
        line: usize,
        reason: String,
    },
    /// A version update failed and was rolled back
    #[error("Migration {version} failed: {source}")]
    Migration {
        version: String,
        #[source]
        source: Box<TaipanError>,
    },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> TaipanError {
        TaipanError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> TaipanError {
        TaipanError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl TaipanError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    pub fn invalid_condition(reason: impl Into<String>) -> Self {
        Self::InvalidCondition {
            reason: reason.into(),
        }
    }

    pub fn shape(reason: impl Into<String>) -> Self {
        Self::Shape {
            reason: reason.into(),
        }
    }

    pub fn data_integrity(reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            reason: reason.into(),
        }
    }

    /// True for caller/programming errors that must never be retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCondition { .. }
                | Self::UnknownType { .. }
                | Self::Shape { .. }
                | Self::Constraint { .. }
                | Self::NoJoinColumn { .. }
                | Self::UnknownTable { .. }
                | Self::UnknownColumn { .. }
                | Self::Definition { .. }
                | Self::InvalidInput { .. }
                | Self::Configuration { .. }
        )
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| TaipanError::database(message).with_source(e))
    }
}

/// Result type alias for survey database operations
pub type Result<T> = std::result::Result<T, TaipanError>;
