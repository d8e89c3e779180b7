//! Axis iteration
//!
//! Stateless-contract, stateful-instance traversal over the columnar
//! store. One filter-parameterized cursor per axis shape; the typed
//! variants are the same cursors with a predicate, so document order
//! and edge cases cannot drift between them.

pub mod iter;

pub use iter::AxisIter;

use crate::store::{NodeId, NodeKind, TreeAccess};

/// The supported traversal axes, in document-order semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Child nodes, attribute/namespace nodes excluded.
    Child,
    /// The structural parent, at most one result.
    Parent,
    /// The start node itself.
    SelfAxis,
    /// Ancestors, document node first (document order).
    Ancestor,
    /// Ancestors plus the start node, document order.
    AncestorOrSelf,
    /// All descendants in document order.
    Descendant,
    /// Start node plus all descendants.
    DescendantOrSelf,
    /// Siblings after the start node.
    FollowingSibling,
    /// Siblings before the start node, document order.
    PrecedingSibling,
    /// Everything after the start node's subtree, in document order.
    Following,
    /// Everything before the start node except its ancestors, in
    /// document order.
    Preceding,
    /// The attribute run of an element.
    Attribute,
    /// The namespace-node run of an element.
    Namespace,
}

/// Optional node predicate applied while advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    /// Match a raw node kind.
    Kind(NodeKind),
    /// Match an exact expanded-type id.
    Expanded(u32),
}

impl TypeFilter {
    /// Apply the predicate to one node.
    #[inline]
    pub fn matches<T: TreeAccess>(&self, tree: &T, id: NodeId) -> bool {
        match *self {
            TypeFilter::Kind(kind) => tree.node_kind(id) == Some(kind),
            TypeFilter::Expanded(exp) => tree.expanded_type(id) == Some(exp),
        }
    }
}

impl crate::store::DocTable {
    /// Iterator over `axis` starting at `start`.
    pub fn axis_iter(&self, axis: Axis, start: NodeId) -> AxisIter<'_, Self> {
        AxisIter::new(self, axis, start)
    }

    /// Type-filtered iterator over `axis` starting at `start`.
    pub fn axis_iter_typed(
        &self,
        axis: Axis,
        start: NodeId,
        filter: TypeFilter,
    ) -> AxisIter<'_, Self> {
        AxisIter::typed(self, axis, start, filter)
    }
}
