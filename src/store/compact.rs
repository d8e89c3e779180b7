//! Compact accessor layer
//!
//! A read-only view over a sealed [`DocTable`] that captures the raw
//! storage blocks of the four hottest columns (type, parent, first
//! child, next sibling) once, so per-node reads skip the `SegList`
//! indexed path. Documents small enough to fit one block resolve every
//! hot read against a cached first-block slice.
//!
//! This is purely a performance variant: every accessor must return
//! exactly what the plain table accessors return.

use std::borrow::Cow;

use super::seglist::{SEG_MASK, SEG_SHIFT, SEG_SIZE};
use super::table::DocTable;
use super::{NodeId, NodeKind, TreeAccess};
use crate::error::TreeError;

/// Block-cached accessor over a sealed table.
#[derive(Clone, Copy)]
pub struct CompactView<'a> {
    table: &'a DocTable,
    count: usize,
    exp0: &'a [u32],
    exp: &'a [Box<[u32]>],
    parent0: &'a [i32],
    parent: &'a [Box<[i32]>],
    first0: &'a [i32],
    first: &'a [Box<[i32]>],
    next0: &'a [i32],
    next: &'a [Box<[i32]>],
}

fn first_block<T>(blocks: &[Box<[T]>]) -> &[T] {
    blocks.first().map(|b| &b[..]).unwrap_or(&[])
}

impl<'a> CompactView<'a> {
    /// Capture the block snapshot. The table must be sealed: the
    /// terminator row guarantees one-past-the-end reads stay in
    /// allocated storage.
    pub fn new(table: &'a DocTable) -> Result<Self, TreeError> {
        if !table.is_sealed() {
            return Err(TreeError::Config(
                "compact view requires a sealed table (end-of-document reached)",
            ));
        }
        let exp = table.exp_blocks().blocks();
        let parent = table.parent_blocks().blocks();
        let first = table.first_child_blocks().blocks();
        let next = table.next_sibling_blocks().blocks();
        Ok(CompactView {
            table,
            count: table.node_count(),
            exp0: first_block(exp),
            exp,
            parent0: first_block(parent),
            parent,
            first0: first_block(first),
            first,
            next0: first_block(next),
            next,
        })
    }

    /// The table behind this view.
    pub fn table(&self) -> &'a DocTable {
        self.table
    }

    #[inline]
    fn exp_at(&self, i: usize) -> u32 {
        if i < SEG_SIZE {
            self.exp0[i]
        } else {
            self.exp[i >> SEG_SHIFT][i & SEG_MASK]
        }
    }

    #[inline]
    fn parent_at(&self, i: usize) -> i32 {
        if i < SEG_SIZE {
            self.parent0[i]
        } else {
            self.parent[i >> SEG_SHIFT][i & SEG_MASK]
        }
    }

    #[inline]
    fn first_at(&self, i: usize) -> i32 {
        if i < SEG_SIZE {
            self.first0[i]
        } else {
            self.first[i >> SEG_SHIFT][i & SEG_MASK]
        }
    }

    #[inline]
    fn next_at(&self, i: usize) -> i32 {
        if i < SEG_SIZE {
            self.next0[i]
        } else {
            self.next[i >> SEG_SHIFT][i & SEG_MASK]
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.count
    }

    /// Expanded-type id.
    #[inline]
    pub fn expanded_type(&self, id: NodeId) -> Option<u32> {
        ((id as usize) < self.count).then(|| self.exp_at(id as usize))
    }

    /// Raw kind, through the shared name table.
    #[inline]
    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.expanded_type(id)
            .and_then(|exp| self.table.names().kind_of(exp))
    }

    /// Structural parent.
    #[inline]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        if (id as usize) >= self.count {
            return None;
        }
        let raw = self.parent_at(id as usize);
        (raw >= 0).then_some(raw as NodeId)
    }

    /// First child.
    #[inline]
    pub fn first_child_of(&self, id: NodeId) -> Option<NodeId> {
        if (id as usize) >= self.count {
            return None;
        }
        let raw = self.first_at(id as usize);
        (raw >= 0).then_some(raw as NodeId)
    }

    /// Next sibling.
    #[inline]
    pub fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        if (id as usize) >= self.count {
            return None;
        }
        let raw = self.next_at(id as usize);
        (raw >= 0).then_some(raw as NodeId)
    }

    /// XPath string-value, identical to the table accessor. The subtree
    /// scan runs on the cached blocks; span decoding and the character
    /// buffer stay shared with the table.
    pub fn string_value(&self, id: NodeId) -> Cow<'a, str> {
        match self.node_kind(id) {
            Some(NodeKind::Document)
            | Some(NodeKind::Element)
            | Some(NodeKind::DocumentFragment) => {
                let bound = id as i32;
                let mut out = String::new();
                let mut i = id as usize + 1;
                while i < self.count && self.parent_at(i) >= bound {
                    if matches!(
                        self.table.names().kind_of(self.exp_at(i)),
                        Some(NodeKind::Text) | Some(NodeKind::CData)
                    ) {
                        if let Some((offset, len)) = self.table.text_span(i as NodeId) {
                            out.push_str(self.table.text_slice(offset, len));
                        }
                    }
                    i += 1;
                }
                Cow::Owned(out)
            }
            _ => self.table.string_value(id),
        }
    }

    /// DOM-style node name (cold path, delegated).
    pub fn node_name(&self, id: NodeId) -> &'a str {
        self.table.node_name(id)
    }

    /// First attribute via the contiguous run, on cached type reads.
    pub fn first_attribute(&self, id: NodeId) -> Option<NodeId> {
        if self.node_kind(id)? != NodeKind::Element {
            return None;
        }
        self.scan_attr_run(id as usize + 1)
    }

    /// Next attribute via the contiguous run.
    pub fn next_attribute(&self, id: NodeId) -> Option<NodeId> {
        if self.node_kind(id)? != NodeKind::Attribute {
            return None;
        }
        self.scan_attr_run(id as usize + 1)
    }

    fn scan_attr_run(&self, mut i: usize) -> Option<NodeId> {
        while i < self.count {
            match self.table.names().kind_of(self.exp_at(i)) {
                Some(NodeKind::Attribute) => return Some(i as NodeId),
                Some(NodeKind::Namespace) => i += 1,
                _ => return None,
            }
        }
        None
    }
}

impl TreeAccess for CompactView<'_> {
    fn node_count(&self) -> usize {
        self.count
    }

    fn available(&self, id: NodeId) -> bool {
        (id as usize) < self.count
    }

    fn expanded_type(&self, id: NodeId) -> Option<u32> {
        CompactView::expanded_type(self, id)
    }

    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        CompactView::node_kind(self, id)
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        CompactView::parent_of(self, id)
    }

    fn first_child_of(&self, id: NodeId) -> Option<NodeId> {
        CompactView::first_child_of(self, id)
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        CompactView::next_sibling_of(self, id)
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.table.prev_sibling_of(id)
    }

    fn current_document(&self) -> NodeId {
        self.table.current_document()
    }

    fn document_of(&self, id: NodeId) -> NodeId {
        self.table.document_of(id)
    }
}
