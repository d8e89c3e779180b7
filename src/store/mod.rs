//! Columnar node store
//!
//! The document is held as parallel growable arrays, one slot per node
//! identity, instead of one struct per node:
//! - Identities are dense and assigned in construction (document) order
//! - Per-node fields live in `SegList` columns addressed by identity
//! - Names are interned once and resolved through the expanded-name table
//! - Text content is an (offset, len) slice into one append-only buffer

pub mod compact;
pub mod names;
pub mod seglist;
pub mod table;
pub mod text;

pub use compact::CompactView;
pub use names::{ExpandedNameTable, StringPool};
pub use seglist::SegList;
pub use table::{DocTable, SourceLocation};
pub use text::TextBuffer;

/// Dense node identity: index into the columnar store.
pub type NodeId = u32;

/// Sentinel start node accepted by axis iterators; normalized to the
/// tree's current document node before any scan bound is computed.
pub const VIRTUAL_ROOT: NodeId = NodeId::MAX;

/// "No node" sentinel for the internal `i32` link columns.
pub(crate) const NULL: i32 = -1;

/// Construction-time sentinel: the field exists but its final value has
/// not been produced yet. Must never be observable once a document is
/// closed; the incremental pump resolves it by building further.
pub(crate) const NOT_PROCESSED: i32 = -2;

/// Raw node kind.
///
/// The per-node columns do not store this directly; it is carried in the
/// expanded-type id and recovered through the [`ExpandedNameTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Attribute node
    Attribute,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
    /// Namespace declaration node
    Namespace,
    /// Document fragment root
    DocumentFragment,
}

/// Number of raw kinds; the expanded-name table reserves this many
/// built-in ids so kind-only node types collapse to their raw constant.
pub(crate) const KIND_COUNT: usize = 9;

impl NodeKind {
    /// Built-in expanded-type id for this kind.
    #[inline]
    pub const fn raw(self) -> u32 {
        match self {
            NodeKind::Document => 0,
            NodeKind::Element => 1,
            NodeKind::Attribute => 2,
            NodeKind::Text => 3,
            NodeKind::CData => 4,
            NodeKind::Comment => 5,
            NodeKind::ProcessingInstruction => 6,
            NodeKind::Namespace => 7,
            NodeKind::DocumentFragment => 8,
        }
    }

    /// Inverse of [`NodeKind::raw`].
    pub const fn from_raw(raw: u32) -> Option<NodeKind> {
        Some(match raw {
            0 => NodeKind::Document,
            1 => NodeKind::Element,
            2 => NodeKind::Attribute,
            3 => NodeKind::Text,
            4 => NodeKind::CData,
            5 => NodeKind::Comment,
            6 => NodeKind::ProcessingInstruction,
            7 => NodeKind::Namespace,
            8 => NodeKind::DocumentFragment,
            _ => return None,
        })
    }

    /// True for the node kinds stored in the contiguous run after their
    /// owner element, which element-body traversal must skip.
    #[inline]
    pub const fn is_attribute_like(self) -> bool {
        matches!(self, NodeKind::Attribute | NodeKind::Namespace)
    }
}

/// Shared point-query contract over the columnar store.
///
/// Implemented by the plain [`DocTable`], the block-cached
/// [`CompactView`], and the pump-driven incremental tree, so axis
/// iterators are written once against this trait. All methods return
/// `None`/`false` for identities that are out of range or unavailable;
/// they never fail.
pub trait TreeAccess {
    /// Number of nodes built so far. Re-read on every iterator step;
    /// a pump-attached tree may grow between calls.
    fn node_count(&self) -> usize;

    /// True once `id` has a built record. On a pump-attached tree this
    /// drives construction forward; everywhere else it is a pure bounds
    /// check.
    fn available(&self, id: NodeId) -> bool;

    /// Expanded-type id of `id`.
    fn expanded_type(&self, id: NodeId) -> Option<u32>;

    /// Raw kind of `id`, recovered from the expanded type.
    fn node_kind(&self, id: NodeId) -> Option<NodeKind>;

    /// Structural parent, or `None` for a document root.
    fn parent_of(&self, id: NodeId) -> Option<NodeId>;

    /// First child, or `None` for a childless node.
    fn first_child_of(&self, id: NodeId) -> Option<NodeId>;

    /// Next sibling, or `None` at the end of a sibling chain.
    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId>;

    /// Previous sibling, if the build tracked the column.
    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId>;

    /// Document node of the most recently appended tree.
    fn current_document(&self) -> NodeId;

    /// Document node owning `id`.
    fn document_of(&self, id: NodeId) -> NodeId;

    /// True for attribute and namespace nodes.
    fn is_attribute_or_namespace(&self, id: NodeId) -> bool {
        matches!(
            self.node_kind(id),
            Some(NodeKind::Attribute) | Some(NodeKind::Namespace)
        )
    }
}
