use allocative::Allocative;
use bitvec::prelude::*;

use crate::record::Record;

/// Positionally addressed row storage.
///
/// Positions are permanent: a deleted row leaves an empty slot behind and the
/// slot is never handed out again. `deleted` is the deletion vector matching
/// the cleared slots.
#[derive(Debug, Allocative)]
pub struct RowStore {
    slots: Vec<Option<Record>>,
    #[allocative(skip)]
    deleted: BitVec,
}

impl RowStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            deleted: BitVec::with_capacity(capacity),
        }
    }

    /// Position the next pushed record will occupy.
    pub fn next_position(&self) -> usize {
        self.slots.len()
    }

    /// Appends `record`, growing the storage by a third when it is full.
    pub fn push(&mut self, record: Record) {
        debug_assert_eq!(record.position(), self.slots.len());
        let len = self.slots.len();
        if len == self.slots.capacity() {
            self.slots.reserve_exact((len / 3).max(1));
        }
        self.slots.push(Some(record));
        self.deleted.push(false);
    }

    /// Record at `position`, or `None` if out of range or deleted.
    pub fn get(&self, position: usize) -> Option<&Record> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Record> {
        self.slots.get_mut(position).and_then(Option::as_mut)
    }

    /// Empties the slot at `position`, returning the record it held.
    pub fn clear(&mut self, position: usize) -> Option<Record> {
        let record = self.slots.get_mut(position)?.take()?;
        self.deleted.set(position, true);
        Some(record)
    }

    pub fn is_deleted(&self, position: usize) -> bool {
        self.deleted.get(position).is_some_and(|bit| *bit)
    }

    /// Number of positions handed out, deleted ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of rows that have not been deleted.
    pub fn live_len(&self) -> usize {
        self.slots.len() - self.deleted.count_ones()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Live records in position order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.slots.iter().flatten()
    }

    /// Positions of the live records, in order.
    pub fn live_positions(&self) -> Vec<usize> {
        self.deleted.iter_zeros().collect()
    }
}
