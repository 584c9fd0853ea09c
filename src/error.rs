use thiserror::Error;

use crate::query::parser::ParseError;
use crate::schema::ColumnType;

/// The coarse classification of every error the crate raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The query could not be built: unresolved identifiers, invalid grouping,
    /// incompatible comparisons.
    QueryConstruction,
    /// A table, column or schema was missing, or DDL conflicted with the schema.
    SchemaMismatch,
    /// The back-end failed while reading or writing.
    BackendIo,
    /// A value could not be coerced to the declared column type.
    ValueConversion,
    /// The back-end or dialect cannot perform the operation.
    Unsupported,
    /// The caller used an object in the wrong state (e.g. a closed data set).
    InvalidState,
}

#[derive(Error, Debug)]
pub enum MetaQueryError {
    #[error("Query construction error: {0}")]
    QueryConstruction(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("SQL error while executing '{sql}': {source}")]
    Sql {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Resource error ({path}): {source}")]
    Resource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error at line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot convert {value} to {target}")]
    ValueConversion { value: String, target: ColumnType },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl MetaQueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetaQueryError::QueryConstruction(_) | MetaQueryError::Parse(_) => {
                ErrorKind::QueryConstruction
            }
            MetaQueryError::SchemaNotFound(_)
            | MetaQueryError::TableNotFound(_)
            | MetaQueryError::ColumnNotFound(_)
            | MetaQueryError::TableAlreadyExists(_)
            | MetaQueryError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            MetaQueryError::Sql { .. }
            | MetaQueryError::Resource { .. }
            | MetaQueryError::Csv { .. }
            | MetaQueryError::Io(_) => ErrorKind::BackendIo,
            MetaQueryError::ValueConversion { .. } => ErrorKind::ValueConversion,
            MetaQueryError::Unsupported(_) => ErrorKind::Unsupported,
            MetaQueryError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    pub(crate) fn sql(sql: impl Into<String>, source: rusqlite::Error) -> Self {
        MetaQueryError::Sql {
            sql: sql.into(),
            source,
        }
    }

    pub(crate) fn resource(path: impl Into<String>, source: std::io::Error) -> Self {
        MetaQueryError::Resource {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn construction(message: impl Into<String>) -> Self {
        MetaQueryError::QueryConstruction(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        MetaQueryError::Unsupported(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MetaQueryError>;
