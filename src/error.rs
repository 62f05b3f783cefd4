//! Domain error taxonomy.
//!
//! These errors travel inside [`anyhow::Error`] like everything else in the
//! crate; callers that need to branch on a specific failure use
//! `err.downcast_ref::<LayoutError>()` and friends. Only [`EncodingError`] is
//! recoverable, and it is logged rather than returned.

use crate::layout::FieldType;

/// Problems with the layout description file. Always raised before any
/// storage write.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Malformed layout row at line {line}: expected at least 4 columns but found {found}")]
    Malformed { line: u64, found: usize },

    #[error("Layout field '{name}' collides with a generated incident column")]
    ReservedName { name: String },

    #[error("Layout field '{name}' differs from '{existing}' only by letter case")]
    NameCollision { name: String, existing: String },
}

/// Fatal problems while importing incident rows.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Line {line}: failed to coerce '{value}' in column '{field}' as {expected}")]
    TypeCoercion {
        field: String,
        value: String,
        expected: FieldType,
        line: u64,
    },

    #[error("Data column '{column}' appears more than once in the header")]
    DuplicateColumn { column: String },

    #[error("Data column '{column}' is not described by the layout")]
    UnknownColumn { column: String },

    #[error("Data file header does not contain the report number column '{column}'")]
    MissingReportNumber { column: String },

    #[error(
        "Post-import verification failed for {table}: expected {expected} row(s) but storage holds {actual}"
    )]
    CountMismatch {
        table: &'static str,
        expected: u64,
        actual: u64,
    },
}

/// Configuration errors in the question catalog.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Query '{query}' references unknown field '{field}'")]
    UnknownField { query: String, field: String },

    #[error("No question named '{name}' in the catalog")]
    UnknownQuery { name: String },
}

/// Invalid byte sequences discarded while decoding a text cell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Discarded invalid byte sequence(s) in column '{field}' at line {line}")]
pub struct EncodingError {
    pub field: String,
    pub line: u64,
}
