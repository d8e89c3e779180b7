//! Axis iterator cursors
//!
//! Every iterator is a start node, an optional type filter, and a small
//! cursor state machine. Identity-scan axes (descendant, following,
//! preceding) exploit pre-order density: a node is inside the start
//! subtree exactly while its parent identity stays at or above the
//! start, so the scan is a bounded forward walk over raw identities.
//!
//! Iterators re-check availability on every step instead of caching the
//! store size, so they tolerate the store growing beneath them while an
//! incremental pump is attached. Exhaustion is a terminal state until
//! [`AxisIter::rebind`]. Cloning copies all state by value; a clone and
//! its original never share scratch buffers.

use super::{Axis, TypeFilter};
use crate::store::{NodeId, NodeKind, TreeAccess, VIRTUAL_ROOT};

#[derive(Debug, Clone)]
enum Cursor {
    Exhausted,
    /// Single-shot result (parent, self).
    Single(NodeId),
    /// Candidate advanced via next-sibling links.
    SiblingChain(NodeId),
    /// Forward sibling walk stopping before `stop` (preceding-sibling).
    SiblingUntil { cur: NodeId, stop: NodeId },
    /// Attribute/namespace run stepping (contiguous after the owner).
    AttrRun { next: NodeId, namespaces: bool },
    /// Raw identity scan bounded by the subtree parent rule.
    SubtreeScan { next: NodeId, root: NodeId },
    /// Raw identity scan to the end of the current tree (following).
    TailScan { next: NodeId },
    /// Materialized chain replayed front to back (ancestor axes).
    Replay { items: Vec<NodeId>, pos: usize },
    /// Bounded scan skipping an excluded identity set (preceding).
    ExcludeScan {
        next: NodeId,
        stop: NodeId,
        skip: Vec<NodeId>,
    },
}

/// A restartable, cloneable axis traversal.
pub struct AxisIter<'t, T: TreeAccess> {
    tree: &'t T,
    axis: Axis,
    start: NodeId,
    filter: Option<TypeFilter>,
    cursor: Cursor,
}

impl<'t, T: TreeAccess> AxisIter<'t, T> {
    /// Unfiltered iterator.
    pub fn new(tree: &'t T, axis: Axis, start: NodeId) -> Self {
        let start = Self::normalize(tree, start);
        let cursor = Self::init(tree, axis, start);
        AxisIter {
            tree,
            axis,
            start,
            filter: None,
            cursor,
        }
    }

    /// Filtered iterator sharing the unfiltered cursor logic.
    pub fn typed(tree: &'t T, axis: Axis, start: NodeId, filter: TypeFilter) -> Self {
        let mut iter = Self::new(tree, axis, start);
        iter.filter = Some(filter);
        iter
    }

    /// The axis this iterator walks.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// The (normalized) start node.
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// Restart from a new start node, keeping axis and filter.
    pub fn rebind(&mut self, start: NodeId) {
        self.start = Self::normalize(self.tree, start);
        self.cursor = Self::init(self.tree, self.axis, self.start);
    }

    /// The virtual-root sentinel resolves to the current document node
    /// before any scan bound is computed.
    fn normalize(tree: &T, start: NodeId) -> NodeId {
        if start == VIRTUAL_ROOT {
            tree.current_document()
        } else {
            start
        }
    }

    fn init(tree: &T, axis: Axis, start: NodeId) -> Cursor {
        if !tree.available(start) {
            return Cursor::Exhausted;
        }
        let attr_like = tree.is_attribute_or_namespace(start);
        match axis {
            Axis::SelfAxis => Cursor::Single(start),
            Axis::Parent => match tree.parent_of(start) {
                Some(parent) => Cursor::Single(parent),
                None => Cursor::Exhausted,
            },
            Axis::Child => match tree.first_child_of(start) {
                Some(first) => Cursor::SiblingChain(first),
                None => Cursor::Exhausted,
            },
            Axis::Ancestor | Axis::AncestorOrSelf => {
                // Materialized up front: the axis is exposed in document
                // order, the reverse of the parent walk.
                let mut items = Vec::new();
                let mut cur = if axis == Axis::AncestorOrSelf {
                    Some(start)
                } else {
                    tree.parent_of(start)
                };
                while let Some(node) = cur {
                    items.push(node);
                    cur = tree.parent_of(node);
                }
                items.reverse();
                Cursor::Replay { items, pos: 0 }
            }
            Axis::Descendant => Cursor::SubtreeScan {
                next: start + 1,
                root: start,
            },
            Axis::DescendantOrSelf => Cursor::SubtreeScan {
                next: start,
                root: start,
            },
            Axis::FollowingSibling => {
                if attr_like {
                    return Cursor::Exhausted;
                }
                match tree.next_sibling_of(start) {
                    Some(next) => Cursor::SiblingChain(next),
                    None => Cursor::Exhausted,
                }
            }
            Axis::PrecedingSibling => {
                // Forward scan bounded by the start identity; no reverse
                // sibling pointer is required.
                if attr_like {
                    return Cursor::Exhausted;
                }
                let Some(parent) = tree.parent_of(start) else {
                    return Cursor::Exhausted;
                };
                match tree.first_child_of(parent) {
                    Some(first) if first != start => Cursor::SiblingUntil {
                        cur: first,
                        stop: start,
                    },
                    _ => Cursor::Exhausted,
                }
            }
            Axis::Following => {
                // Sibling-then-up-and-over to the first node past the
                // start subtree, then a raw scan.
                let mut node = if attr_like {
                    match tree.parent_of(start) {
                        Some(owner) => owner,
                        None => return Cursor::Exhausted,
                    }
                } else {
                    start
                };
                loop {
                    if let Some(sibling) = tree.next_sibling_of(node) {
                        return Cursor::TailScan { next: sibling };
                    }
                    match tree.parent_of(node) {
                        Some(parent) => node = parent,
                        None => return Cursor::Exhausted,
                    }
                }
            }
            Axis::Preceding => {
                // {root+1 .. start-1} minus ancestors minus the
                // attribute/namespace runs.
                let mut skip = Vec::new();
                let mut cur = tree.parent_of(start);
                while let Some(parent) = cur {
                    skip.push(parent);
                    cur = tree.parent_of(parent);
                }
                Cursor::ExcludeScan {
                    next: tree.document_of(start) + 1,
                    stop: start,
                    skip,
                }
            }
            Axis::Attribute => {
                if tree.node_kind(start) != Some(NodeKind::Element) {
                    return Cursor::Exhausted;
                }
                Cursor::AttrRun {
                    next: start + 1,
                    namespaces: false,
                }
            }
            Axis::Namespace => {
                if tree.node_kind(start) != Some(NodeKind::Element) {
                    return Cursor::Exhausted;
                }
                Cursor::AttrRun {
                    next: start + 1,
                    namespaces: true,
                }
            }
        }
    }

    #[inline]
    fn accept(&self, id: NodeId) -> bool {
        match self.filter {
            None => true,
            Some(filter) => filter.matches(self.tree, id),
        }
    }
}

impl<T: TreeAccess> Clone for AxisIter<'_, T> {
    fn clone(&self) -> Self {
        AxisIter {
            tree: self.tree,
            axis: self.axis,
            start: self.start,
            filter: self.filter,
            cursor: self.cursor.clone(),
        }
    }
}

impl<T: TreeAccess> Iterator for AxisIter<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            match std::mem::replace(&mut self.cursor, Cursor::Exhausted) {
                Cursor::Exhausted => return None,

                Cursor::Single(id) => {
                    if self.accept(id) {
                        return Some(id);
                    }
                }

                Cursor::SiblingChain(cur) => {
                    if let Some(next) = self.tree.next_sibling_of(cur) {
                        self.cursor = Cursor::SiblingChain(next);
                    }
                    if self.accept(cur) {
                        return Some(cur);
                    }
                }

                Cursor::SiblingUntil { cur, stop } => {
                    if cur == stop {
                        return None;
                    }
                    if let Some(next) = self.tree.next_sibling_of(cur) {
                        self.cursor = Cursor::SiblingUntil { cur: next, stop };
                    }
                    if self.accept(cur) {
                        return Some(cur);
                    }
                }

                Cursor::AttrRun { next, namespaces } => match self.tree.node_kind(next) {
                    Some(kind) if kind.is_attribute_like() => {
                        self.cursor = Cursor::AttrRun {
                            next: next + 1,
                            namespaces,
                        };
                        let is_namespace = kind == NodeKind::Namespace;
                        if is_namespace == namespaces && self.accept(next) {
                            return Some(next);
                        }
                    }
                    _ => return None,
                },

                Cursor::SubtreeScan { next, root } => {
                    if !self.tree.available(next) {
                        return None;
                    }
                    let inside = next == root
                        || matches!(self.tree.parent_of(next), Some(p) if p >= root);
                    if !inside {
                        return None;
                    }
                    self.cursor = Cursor::SubtreeScan {
                        next: next + 1,
                        root,
                    };
                    let attr_like = self.tree.is_attribute_or_namespace(next);
                    if (next == root || !attr_like) && self.accept(next) {
                        return Some(next);
                    }
                }

                Cursor::TailScan { next } => {
                    if !self.tree.available(next) {
                        return None;
                    }
                    match self.tree.node_kind(next) {
                        None => return None,
                        // A later document node means the scan crossed
                        // into the next appended tree.
                        Some(NodeKind::Document) => return None,
                        Some(kind) => {
                            self.cursor = Cursor::TailScan { next: next + 1 };
                            if !kind.is_attribute_like() && self.accept(next) {
                                return Some(next);
                            }
                        }
                    }
                }

                Cursor::Replay { items, pos } => {
                    if pos >= items.len() {
                        return None;
                    }
                    let id = items[pos];
                    self.cursor = Cursor::Replay {
                        items,
                        pos: pos + 1,
                    };
                    if self.accept(id) {
                        return Some(id);
                    }
                }

                Cursor::ExcludeScan { next, stop, skip } => {
                    if next >= stop || !self.tree.available(next) {
                        return None;
                    }
                    let excluded =
                        skip.contains(&next) || self.tree.is_attribute_or_namespace(next);
                    let candidate = next;
                    self.cursor = Cursor::ExcludeScan {
                        next: next + 1,
                        stop,
                        skip,
                    };
                    if !excluded && self.accept(candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{play_all, Event, OwnedAttr, TreeBuilder};
    use crate::store::DocTable;

    /// <root><a><b/>text</a><c/></root>
    ///
    /// Identities: 0 document, 1 root, 2 xml namespace, 3 a, 4 b,
    /// 5 text, 6 c.
    fn sample() -> DocTable {
        let mut builder = TreeBuilder::new();
        play_all(
            &[
                Event::StartDocument,
                Event::open("root"),
                Event::open("a"),
                Event::open("b"),
                Event::close("b"),
                Event::text("text"),
                Event::close("a"),
                Event::open("c"),
                Event::close("c"),
                Event::close("root"),
                Event::EndDocument,
            ],
            &mut builder,
        );
        builder.finish()
    }

    fn collect(table: &DocTable, axis: Axis, start: NodeId) -> Vec<NodeId> {
        table.axis_iter(axis, start).collect()
    }

    #[test]
    fn child_axis_skips_attribute_run() {
        let table = sample();
        assert_eq!(collect(&table, Axis::Child, 1), vec![3, 6]);
        assert_eq!(collect(&table, Axis::Child, 0), vec![1]);
        assert_eq!(collect(&table, Axis::Child, 4), Vec::<NodeId>::new());
    }

    #[test]
    fn descendant_axis_in_document_order() {
        let table = sample();
        assert_eq!(collect(&table, Axis::Descendant, 1), vec![3, 4, 5, 6]);
        assert_eq!(collect(&table, Axis::Descendant, 3), vec![4, 5]);
        assert_eq!(
            collect(&table, Axis::DescendantOrSelf, 3),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn descendant_elements_from_root_enumerate_every_element_once() {
        let table = sample();
        let elems: Vec<NodeId> = table
            .axis_iter_typed(Axis::Descendant, 0, TypeFilter::Kind(NodeKind::Element))
            .collect();
        assert_eq!(elems, vec![1, 3, 4, 6]);
    }

    #[test]
    fn ancestor_axis_document_order() {
        let table = sample();
        assert_eq!(collect(&table, Axis::Ancestor, 4), vec![0, 1, 3]);
        assert_eq!(collect(&table, Axis::AncestorOrSelf, 4), vec![0, 1, 3, 4]);
        assert_eq!(collect(&table, Axis::Ancestor, 0), Vec::<NodeId>::new());
    }

    #[test]
    fn sibling_axes() {
        let table = sample();
        assert_eq!(collect(&table, Axis::FollowingSibling, 3), vec![6]);
        assert_eq!(collect(&table, Axis::FollowingSibling, 6), Vec::<NodeId>::new());
        assert_eq!(collect(&table, Axis::PrecedingSibling, 6), vec![3]);
        assert_eq!(collect(&table, Axis::PrecedingSibling, 3), Vec::<NodeId>::new());
        assert_eq!(collect(&table, Axis::PrecedingSibling, 5), vec![4]);
    }

    #[test]
    fn following_axis_walks_up_and_over() {
        let table = sample();
        assert_eq!(collect(&table, Axis::Following, 4), vec![5, 6]);
        assert_eq!(collect(&table, Axis::Following, 3), vec![6]);
        assert_eq!(collect(&table, Axis::Following, 6), Vec::<NodeId>::new());
    }

    #[test]
    fn preceding_axis_excludes_ancestors() {
        let table = sample();
        assert_eq!(collect(&table, Axis::Preceding, 6), vec![3, 4, 5]);
        assert_eq!(collect(&table, Axis::Preceding, 4), Vec::<NodeId>::new());
        assert_eq!(collect(&table, Axis::Preceding, 5), vec![4]);
    }

    #[test]
    fn parent_and_self_axes() {
        let table = sample();
        assert_eq!(collect(&table, Axis::Parent, 4), vec![3]);
        assert_eq!(collect(&table, Axis::Parent, 0), Vec::<NodeId>::new());
        assert_eq!(collect(&table, Axis::SelfAxis, 4), vec![4]);
        let filtered: Vec<NodeId> = table
            .axis_iter_typed(Axis::Parent, 4, TypeFilter::Kind(NodeKind::Text))
            .collect();
        assert!(filtered.is_empty());
    }

    #[test]
    fn attribute_axis_with_typed_single_shot() {
        let mut builder = TreeBuilder::new();
        play_all(
            &[
                Event::StartDocument,
                Event::open_with(
                    "e",
                    vec![OwnedAttr::new("p", "1"), OwnedAttr::new("q", "2")],
                ),
                Event::close("e"),
                Event::EndDocument,
            ],
            &mut builder,
        );
        let table = builder.finish();
        let elem = table.first_child_of(0).unwrap();
        let attrs: Vec<NodeId> = table.axis_iter(Axis::Attribute, elem).collect();
        assert_eq!(attrs.len(), 2);
        assert_eq!(table.local_name(attrs[0]), "p");
        assert_eq!(table.local_name(attrs[1]), "q");

        let q_exp = table.expanded_type(attrs[1]).unwrap();
        let typed: Vec<NodeId> = table
            .axis_iter_typed(Axis::Attribute, elem, TypeFilter::Expanded(q_exp))
            .collect();
        assert_eq!(typed, vec![attrs[1]]);

        let ns: Vec<NodeId> = table.axis_iter(Axis::Namespace, elem).collect();
        assert_eq!(ns.len(), 1);
        assert_eq!(table.local_name(ns[0]), "xml");
    }

    #[test]
    fn rebind_restarts_and_clone_is_independent() {
        let table = sample();
        let mut iter = table.axis_iter(Axis::Descendant, 1);
        assert_eq!(iter.next(), Some(3));

        let mut cloned = iter.clone();
        assert_eq!(iter.next(), Some(4));
        // The clone continues from where it was copied.
        assert_eq!(cloned.next(), Some(4));
        assert_eq!(cloned.next(), Some(5));

        iter.rebind(3);
        assert_eq!(iter.next(), Some(4));
        assert_eq!(iter.next(), Some(5));
        assert_eq!(iter.next(), None);
        // Exhaustion is terminal until rebound.
        assert_eq!(iter.next(), None);
        iter.rebind(1);
        assert_eq!(iter.next(), Some(3));
    }

    #[test]
    fn virtual_root_normalizes_to_current_document() {
        let table = sample();
        let kids = collect(&table, Axis::Child, crate::store::VIRTUAL_ROOT);
        assert_eq!(kids, vec![1]);
    }

    #[test]
    fn axes_over_incremental_tree_pull_construction() {
        use crate::build::{IncrementalTree, VecSource};
        let events = vec![
            Event::StartDocument,
            Event::open("root"),
            Event::open("a"),
            Event::close("a"),
            Event::open("b"),
            Event::close("b"),
            Event::close("root"),
            Event::EndDocument,
        ];
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(events, 1));
        assert!(tree.advance_if_needed(0).unwrap());
        // Nothing past the document exists yet; the iterator pulls it in.
        let elems: Vec<NodeId> =
            AxisIter::typed(&tree, Axis::Descendant, 0, TypeFilter::Kind(NodeKind::Element))
                .collect();
        assert_eq!(elems.len(), 3);
        tree.with_table(|t| {
            assert_eq!(t.local_name(elems[0]), "root");
            assert_eq!(t.local_name(elems[1]), "a");
            assert_eq!(t.local_name(elems[2]), "b");
        });
    }
}
