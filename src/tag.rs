use std::sync::Arc;

use allocative::Allocative;
use rustc_hash::FxHashMap;
use thunderdome::{Arena, Index};

/// Handle of a [TagNode] inside the arena of the tag column that owns it.
pub type TagHandle = Index;

/// One element of a tag chain: the row position it refers to and the next
/// node sharing the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagNode {
    pub slot: usize,
    pub next: Option<TagHandle>,
}

/// Outcome of [TagIndex::remove].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRemoval {
    /// The node was the only one for its value; the chain entry is gone.
    Emptied,
    /// The node was the chain head and was unlinked directly.
    Unlinked,
    /// The head's row was moved into the removed node and the head unlinked.
    /// The row at `slot` is now represented by the node that was passed in
    /// and its back-reference must be repointed.
    Slid { slot: usize },
}

/// Multi-value index of a tag column: every distinct value maps to the head
/// of a singly-linked chain of nodes, one node per row holding that value.
///
/// New nodes are prepended, so walking a chain yields the most recently
/// tagged rows first.
#[derive(Debug, Allocative)]
pub struct TagIndex {
    tag_slot: usize,
    #[allocative(skip)]
    heads: FxHashMap<Arc<str>, TagHandle>,
    #[allocative(skip)]
    nodes: Arena<TagNode>,
}

impl TagIndex {
    /// Creates an empty index occupying position `tag_slot` in the table's
    /// list of tag columns.
    pub fn new(tag_slot: usize) -> Self {
        Self {
            tag_slot,
            heads: FxHashMap::default(),
            nodes: Arena::new(),
        }
    }

    pub fn tag_slot(&self) -> usize {
        self.tag_slot
    }

    /// Prepends a node for the row at `slot` to the chain of `value`.
    pub fn push(&mut self, value: &Arc<str>, slot: usize) -> TagHandle {
        let head = self.heads.get(&**value).copied();
        let handle = self.nodes.insert(TagNode { slot, next: head });
        self.heads.insert(Arc::clone(value), handle);
        handle
    }

    /// Removes `node` from the chain of `value` without walking the chain.
    ///
    /// When `node` is not the head, the head's row position is copied into
    /// `node` and the head is unlinked instead.
    pub fn remove(&mut self, value: &str, node: TagHandle) -> TagRemoval {
        let Some(head) = self.heads.get(value).copied() else {
            debug_assert!(false, "tag chain for {value:?} is missing");
            return TagRemoval::Emptied;
        };
        let Some(head_node) = self.nodes.remove(head) else {
            debug_assert!(false, "tag chain head for {value:?} is dangling");
            self.heads.remove(value);
            return TagRemoval::Emptied;
        };
        match head_node.next {
            Some(next) => {
                if let Some(entry) = self.heads.get_mut(value) {
                    *entry = next;
                }
            }
            None => {
                self.heads.remove(value);
            }
        }
        if head == node {
            return if head_node.next.is_some() {
                TagRemoval::Unlinked
            } else {
                TagRemoval::Emptied
            };
        }
        match self.nodes.get_mut(node) {
            Some(target) => {
                target.slot = head_node.slot;
                TagRemoval::Slid {
                    slot: head_node.slot,
                }
            }
            None => {
                debug_assert!(false, "removed tag node is not in the arena");
                TagRemoval::Emptied
            }
        }
    }

    /// Row positions tagged with `value`, head first.
    pub fn slots<'a>(&'a self, value: &str) -> Slots<'a> {
        Slots {
            nodes: &self.nodes,
            cursor: self.heads.get(value).copied(),
        }
    }

    /// Number of nodes in the chain of `value`.
    pub fn chain_len(&self, value: &str) -> usize {
        self.slots(value).count()
    }

    /// Whether any row is tagged with `value`.
    pub fn contains(&self, value: &str) -> bool {
        self.heads.contains_key(value)
    }

    pub fn node(&self, handle: TagHandle) -> Option<&TagNode> {
        self.nodes.get(handle)
    }

    /// Number of live nodes across all chains.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Iterator over the row positions of one tag chain.
pub struct Slots<'a> {
    nodes: &'a Arena<TagNode>,
    cursor: Option<TagHandle>,
}

impl Iterator for Slots<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node.slot)
    }
}
