use std::sync::Arc;

use allocative::Allocative;
use rustc_hash::FxHashMap;

use crate::error::{TableError, TableResult};
use crate::tag::TagIndex;

/// Unique index of a key column: value to row position.
pub type KeyIndex = FxHashMap<Arc<str>, usize>;

/// The role a column plays in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// The implicit `id` column at ordinal 0; its value is the row position.
    Id,
    /// Plain storage, no index.
    Normal,
    /// Unique index.
    Key,
    /// Multi-value index.
    Tag,
}

/// Index data carried by a column, one variant per [ColumnKind].
#[derive(Debug, Allocative)]
pub enum ColumnIndex {
    Id,
    Normal,
    Key(KeyIndex),
    Tag(TagIndex),
}

/// Represents a column within a table.
///
/// The ordinal is assigned at creation and never changes: it is the offset of
/// the column's value inside every record.
#[derive(Debug, Allocative)]
pub struct Column {
    /// The name of the column.
    pub name: String,
    /// Position of the column in the table and in every record.
    pub ordinal: usize,
    index: ColumnIndex,
}

impl Column {
    /// Name of the implicit row id column.
    pub const ID: &'static str = "id";

    /// Creates a new, unindexed column.
    pub fn new(name: String, ordinal: usize) -> Self {
        Self {
            name,
            ordinal,
            index: ColumnIndex::Normal,
        }
    }

    /// Creates the implicit `id` column.
    pub fn id() -> Self {
        Self {
            name: Self::ID.to_owned(),
            ordinal: 0,
            index: ColumnIndex::Id,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self.index {
            ColumnIndex::Id => ColumnKind::Id,
            ColumnIndex::Normal => ColumnKind::Normal,
            ColumnIndex::Key(_) => ColumnKind::Key,
            ColumnIndex::Tag(_) => ColumnKind::Tag,
        }
    }

    /// Returns true for every column usable as a filter: id, key and tag.
    pub fn is_indexed(&self) -> bool {
        !matches!(self.index, ColumnIndex::Normal)
    }

    pub fn is_key(&self) -> bool {
        matches!(self.index, ColumnIndex::Key(_))
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.index, ColumnIndex::Tag(_))
    }

    /// Turns a normal column into a key column backed by `key`.
    ///
    /// # Errors
    /// Returns [TableError::AlreadyIndexed] if the column is not a normal
    /// column; the column is left untouched.
    pub fn promote_to_key(&mut self, key: KeyIndex) -> TableResult<()> {
        if self.is_indexed() {
            return Err(TableError::already_indexed(&self.name));
        }
        self.index = ColumnIndex::Key(key);
        Ok(())
    }

    /// Turns a normal column into a tag column occupying `tag_slot` in the
    /// table's list of tag columns.
    ///
    /// # Errors
    /// Returns [TableError::AlreadyIndexed] if the column is not a normal
    /// column.
    pub fn promote_to_tag(&mut self, tag_slot: usize) -> TableResult<()> {
        if self.is_indexed() {
            return Err(TableError::already_indexed(&self.name));
        }
        self.index = ColumnIndex::Tag(TagIndex::new(tag_slot));
        Ok(())
    }

    /// Returns true if this is a key column and some row holds `value`.
    pub fn contains_key_value(&self, value: &str) -> bool {
        self.key_position(value).is_some()
    }

    /// Row position owning `value` in a key column.
    pub fn key_position(&self, value: &str) -> Option<usize> {
        match &self.index {
            ColumnIndex::Key(key) => key.get(value).copied(),
            _ => None,
        }
    }

    /// Records that the row at `position` now owns `value`.
    pub fn key_insert(&mut self, value: Arc<str>, position: usize) {
        if let ColumnIndex::Key(key) = &mut self.index {
            key.insert(value, position);
        }
    }

    /// Drops `value` from a key column, but only if it belongs to the row at
    /// `position`.
    pub fn key_remove(&mut self, value: &str, position: usize) {
        if let ColumnIndex::Key(key) = &mut self.index {
            if key.get(value) == Some(&position) {
                key.remove(value);
            }
        }
    }

    pub fn tags(&self) -> Option<&TagIndex> {
        match &self.index {
            ColumnIndex::Tag(tags) => Some(tags),
            _ => None,
        }
    }

    pub fn tags_mut(&mut self) -> Option<&mut TagIndex> {
        match &mut self.index {
            ColumnIndex::Tag(tags) => Some(tags),
            _ => None,
        }
    }
}
