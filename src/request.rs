//! Pre-parsed requests accepted by a [Table](crate::Table) and the responses
//! it hands back. The SQL front end builds the former, the wire layer encodes
//! the latter.

use serde::{Deserialize, Serialize};

/// A `column = value` pair, as written by insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub column: String,
    pub value: String,
}

impl ColumnValue {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Single equality predicate selecting the rows a request applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertRequest {
    pub column_values: Vec<ColumnValue>,
}

impl InsertRequest {
    /// Builds a request from `(column, value)` pairs.
    pub fn new<C, V>(pairs: impl IntoIterator<Item = (C, V)>) -> Self
    where
        C: Into<String>,
        V: Into<String>,
    {
        Self {
            column_values: pairs
                .into_iter()
                .map(|(c, v)| ColumnValue::new(c, v))
                .collect(),
        }
    }
}

/// `filter: None` selects every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectRequest {
    pub filter: Option<Filter>,
}

impl SelectRequest {
    pub fn all() -> Self {
        Self { filter: None }
    }

    pub fn filtered(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            filter: Some(Filter::new(column, value)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub filter: Option<Filter>,
    pub column_values: Vec<ColumnValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub filter: Option<Filter>,
}

/// Declares a unique key on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    pub column: String,
}

/// Declares a tag (multi-value index) on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequest {
    pub column: String,
}

/// Any request a table can execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Insert(InsertRequest),
    Select(SelectRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    Key(KeyRequest),
    Tag(TagRequest),
}

impl Request {
    /// Returns true for requests that may create a missing table.
    pub fn creates_table(&self) -> bool {
        matches!(self, Self::Insert(_) | Self::Key(_) | Self::Tag(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResponse {
    /// Id of the new row.
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectResponse {
    /// Every column of the table, in ordinal order.
    pub columns: Vec<String>,
    /// One entry per matched row, aligned with `columns`.
    pub records: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

/// Successful outcome of a [Request].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Insert(InsertResponse),
    Select(SelectResponse),
    Update(UpdateResponse),
    Delete(DeleteResponse),
}
