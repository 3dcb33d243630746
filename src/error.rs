use std::fmt;

use thiserror::Error;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Why a key could not be defined over existing data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyConflict {
    /// The column does not exist yet but the table already holds rows.
    MissingColumn,
    /// Two live rows share this value.
    Duplicate(String),
}

impl fmt::Display for KeyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn => write!(f, "column does not exist on existing records"),
            Self::Duplicate(value) => {
                write!(f, "value {value:?} is duplicated in existing records")
            }
        }
    }
}

/// Errors returned to the caller of a table request.
///
/// None of them are fatal: the table is always left in the state it had
/// before the failing request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    /// Insert or update would give a key column the same value on two rows.
    #[error("duplicate value {value:?} for key column {column}")]
    DuplicateKeyValue { column: String, value: String },

    /// A key can not be safely defined over the rows already stored.
    #[error("can not define key for column {column}: {reason}")]
    AmbiguousKeyDefinition { column: String, reason: KeyConflict },

    /// The column already carries a key or a tag.
    #[error("key or tag already defined for column {column}")]
    AlreadyIndexed { column: String },

    /// The filter names a column the table does not have.
    #[error("invalid column: {column}")]
    UnknownColumn { column: String },

    /// Only id, key and tag columns can be used as filters.
    #[error("can not use non indexed column {column} as filter")]
    UnindexedFilterColumn { column: String },

    /// The database has no table with this name.
    #[error("table {table} does not exist")]
    UnknownTable { table: String },
}

impl TableError {
    pub(crate) fn duplicate(column: &str, value: &str) -> Self {
        Self::DuplicateKeyValue {
            column: column.to_owned(),
            value: value.to_owned(),
        }
    }

    pub(crate) fn already_indexed(column: &str) -> Self {
        Self::AlreadyIndexed {
            column: column.to_owned(),
        }
    }
}
