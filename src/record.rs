use std::sync::Arc;

use allocative::Allocative;

use crate::tag::TagHandle;

/// One row: its positional values plus a back-reference to its node in every
/// tag column's chain.
///
/// Values are widened lazily: a record created before a column existed has no
/// storage for it and reads it as an empty string.
#[derive(Debug, Clone, Allocative)]
pub struct Record {
    position: usize,
    values: Vec<Arc<str>>,
    #[allocative(skip)]
    tag_refs: Vec<Option<TagHandle>>,
}

impl Record {
    /// Creates a record for row `position`, sized for the current schema.
    /// The id column is filled with the stringified position.
    pub fn new(position: usize, column_count: usize, tag_count: usize) -> Self {
        let mut values = Vec::with_capacity(column_count.max(1));
        values.push(Arc::from(position.to_string()));
        Self {
            position,
            values,
            tag_refs: vec![None; tag_count],
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Externally visible identifier of the row.
    pub fn id(&self) -> String {
        self.position.to_string()
    }

    /// Value stored at `ordinal`, or `""` if nothing was ever written there.
    pub fn value(&self, ordinal: usize) -> &str {
        self.values.get(ordinal).map_or("", |v| v.as_ref())
    }

    /// Shared handle to the value at `ordinal`.
    pub fn value_arc(&self, ordinal: usize) -> Arc<str> {
        self.values
            .get(ordinal)
            .cloned()
            .unwrap_or_else(|| Arc::from(""))
    }

    /// Writes `value` at `ordinal`, widening the storage if needed.
    pub fn set_value(&mut self, ordinal: usize, value: Arc<str>) {
        if ordinal >= self.values.len() {
            let empty: Arc<str> = Arc::from("");
            self.values.resize(ordinal + 1, empty);
        }
        self.values[ordinal] = value;
    }

    /// Copies the values out, padded with empty strings up to `width`.
    pub fn to_row(&self, width: usize) -> Vec<String> {
        (0..width).map(|o| self.value(o).to_owned()).collect()
    }

    /// This record's node in the tag column at `tag_slot`.
    pub fn tag_ref(&self, tag_slot: usize) -> Option<TagHandle> {
        self.tag_refs.get(tag_slot).copied().flatten()
    }

    pub fn set_tag_ref(&mut self, tag_slot: usize, handle: Option<TagHandle>) {
        if tag_slot >= self.tag_refs.len() {
            self.tag_refs.resize(tag_slot + 1, None);
        }
        self.tag_refs[tag_slot] = handle;
    }

    /// Clears and returns the back-reference at `tag_slot`.
    pub fn take_tag_ref(&mut self, tag_slot: usize) -> Option<TagHandle> {
        self.tag_refs.get_mut(tag_slot).and_then(Option::take)
    }
}
