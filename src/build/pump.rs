//! Incremental pump: pull-driven on-demand construction
//!
//! A query that needs an identity beyond the built range asks the event
//! source to deliver more events into the builder, repeating until the
//! identity exists, the source reports exhaustion, or the source fails.
//! The consumer thread is the only driver; the handshake is strictly
//! request/response.

use std::cell::RefCell;

use tracing::debug;

use super::builder::TreeBuilder;
use crate::store::table::DocTable;
use crate::store::{NodeId, NodeKind, TreeAccess, NOT_PROCESSED};
use crate::TreeError;

/// Outcome of one delivery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Events were delivered; more may remain.
    More,
    /// The source is exhausted and must not be asked again.
    Exhausted,
}

/// An external producer of construction events that can be asked to
/// deliver more on demand.
pub trait EventSource {
    /// Push some events into the builder now. How many is up to the
    /// source; delivering nothing and returning [`SourceStatus::More`]
    /// forever would stall the pump, so a source must make progress or
    /// report exhaustion.
    fn deliver_more(&mut self, builder: &mut TreeBuilder) -> Result<SourceStatus, TreeError>;
}

struct PumpState<S> {
    builder: TreeBuilder,
    source: Option<S>,
    failure: Option<TreeError>,
}

/// A tree under on-demand construction.
///
/// Wraps a builder and its event source behind single-thread interior
/// mutability so the read-shaped query surface can drive construction.
/// Point queries and axis iterators work against the built prefix and
/// transparently pull more when they run off the end.
///
/// A source failure poisons the pump: the failure is returned by
/// [`IncrementalTree::advance_if_needed`] and kept for
/// [`IncrementalTree::error`], while trait-level reads treat the
/// unbuilt range as unavailable, so iterators end instead of failing.
pub struct IncrementalTree<S: EventSource> {
    state: RefCell<PumpState<S>>,
}

impl<S: EventSource> IncrementalTree<S> {
    /// Attach a source to a builder.
    pub fn new(builder: TreeBuilder, source: S) -> Self {
        IncrementalTree {
            state: RefCell::new(PumpState {
                builder,
                source: Some(source),
                failure: None,
            }),
        }
    }

    /// Drive construction until `done` holds or the source gives out.
    fn pump_until(&self, done: impl Fn(&TreeBuilder) -> bool) -> bool {
        let mut state = self.state.borrow_mut();
        loop {
            if done(&state.builder) {
                return true;
            }
            let PumpState {
                builder,
                source,
                failure,
            } = &mut *state;
            let Some(active) = source.as_mut() else {
                return false;
            };
            match active.deliver_more(builder) {
                Ok(SourceStatus::More) => {}
                Ok(SourceStatus::Exhausted) => {
                    debug!(nodes = builder.table().node_count(), "event source exhausted");
                    *source = None;
                    return done(builder);
                }
                Err(err) => {
                    debug!(error = %err, "event source failure; pump detached");
                    *failure = Some(err);
                    *source = None;
                    return false;
                }
            }
        }
    }

    /// Make `target` available, building as needed. `Ok(false)` means
    /// the source ran out first; with no source attached this is a
    /// no-op that reports unavailable. A recorded source failure is
    /// returned to the caller that triggered it and to every later
    /// caller.
    pub fn advance_if_needed(&self, target: NodeId) -> Result<bool, TreeError> {
        let built = self.pump_until(|b| (target as usize) < b.table().node_count());
        if built {
            return Ok(true);
        }
        match self.state.borrow().failure.clone() {
            Some(err) => Err(err),
            None => Ok(false),
        }
    }

    /// Drive construction to completion. Fails only on source failure.
    pub fn advance_to_end(&self) -> Result<(), TreeError> {
        self.pump_until(|_| false);
        match self.state.borrow().failure.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Permanently stop asking the source for more. Out-of-range
    /// queries degenerate to "no such node" from here on.
    pub fn detach(&self) {
        let mut state = self.state.borrow_mut();
        if state.source.take().is_some() {
            debug!("incremental pump detached");
        }
    }

    /// True while a source is still attached.
    pub fn is_attached(&self) -> bool {
        self.state.borrow().source.is_some()
    }

    /// The failure that poisoned the pump, if any.
    pub fn error(&self) -> Option<TreeError> {
        self.state.borrow().failure.clone()
    }

    /// Run a closure against the table built so far.
    pub fn with_table<R>(&self, f: impl FnOnce(&DocTable) -> R) -> R {
        f(self.state.borrow().builder.table())
    }

    /// Finish construction and unwrap the store. Pumps the source dry
    /// first; fails on source failure.
    pub fn into_table(self) -> Result<DocTable, TreeError> {
        self.advance_to_end()?;
        let state = self.state.into_inner();
        match state.failure {
            Some(err) => Err(err),
            None => Ok(state.builder.finish()),
        }
    }

    /// ID lookup that keeps building while the value is unseen and the
    /// document may still grow.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.pump_until(|b| b.table().element_by_id(value).is_some());
        self.with_table(|t| t.element_by_id(value))
    }

    /// Owned string-value of a node, pumping the node's whole subtree
    /// in first.
    pub fn string_value(&self, id: NodeId) -> String {
        if !self.available(id) {
            return String::new();
        }
        // The subtree is complete once a node outside it exists or the
        // source is exhausted; the scan below re-checks per step.
        let mut out = String::new();
        match self.node_kind(id) {
            Some(NodeKind::Document) | Some(NodeKind::Element) | Some(NodeKind::DocumentFragment) => {
                let mut i = id + 1;
                while self.available(i) {
                    let state = self.state.borrow();
                    let table = state.builder.table();
                    match table.raw_parent(i) {
                        Some(raw) if raw >= id as i32 => {}
                        _ => break,
                    }
                    if matches!(
                        table.node_kind(i),
                        Some(NodeKind::Text) | Some(NodeKind::CData)
                    ) {
                        if let Some((offset, len)) = table.text_span(i) {
                            out.push_str(table.text_slice(offset, len));
                        }
                    }
                    i += 1;
                }
            }
            Some(_) => {
                self.with_table(|t| out.push_str(&t.string_value(id)));
            }
            None => {}
        }
        out
    }

    /// DOM-style node name, owned.
    pub fn node_name(&self, id: NodeId) -> String {
        if !self.available(id) {
            return String::new();
        }
        self.with_table(|t| t.node_name(id).to_string())
    }

    /// Resolve a link column that may still hold the construction
    /// sentinel, pumping until the final value exists. A truncated
    /// source can leave the sentinel in place forever; that reads as
    /// "no such node".
    fn resolve_link(&self, read: impl Fn(&DocTable) -> Option<i32>) -> Option<NodeId> {
        self.pump_until(|b| read(b.table()) != Some(NOT_PROCESSED));
        let state = self.state.borrow();
        match read(state.builder.table()) {
            Some(raw) if raw >= 0 => Some(raw as NodeId),
            _ => None,
        }
    }
}

impl<S: EventSource> TreeAccess for IncrementalTree<S> {
    fn node_count(&self) -> usize {
        self.state.borrow().builder.table().node_count()
    }

    fn available(&self, id: NodeId) -> bool {
        self.advance_if_needed(id).unwrap_or(false)
    }

    fn expanded_type(&self, id: NodeId) -> Option<u32> {
        if !self.available(id) {
            return None;
        }
        self.with_table(|t| t.expanded_type(id))
    }

    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        if !self.available(id) {
            return None;
        }
        self.with_table(|t| t.node_kind(id))
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.available(id) {
            return None;
        }
        self.with_table(|t| t.parent_of(id))
    }

    fn first_child_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.available(id) {
            return None;
        }
        self.resolve_link(|t| t.raw_first_child(id))
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.available(id) {
            return None;
        }
        self.resolve_link(|t| t.raw_next_sibling(id))
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.available(id) {
            return None;
        }
        self.with_table(|t| t.prev_sibling_of(id))
    }

    fn current_document(&self) -> NodeId {
        self.with_table(|t| t.current_document())
    }

    fn document_of(&self, id: NodeId) -> NodeId {
        self.with_table(|t| t.document_of(id))
    }
}

/// Buffered event source delivering a fixed number of events per pump
/// request. The batching makes on-demand construction observable.
pub struct VecSource {
    events: std::vec::IntoIter<super::events::Event>,
    batch: usize,
}

impl VecSource {
    /// Source over an owned event sequence.
    pub fn new(events: Vec<super::events::Event>, batch: usize) -> Self {
        VecSource {
            events: events.into_iter(),
            batch: batch.max(1),
        }
    }
}

impl EventSource for VecSource {
    fn deliver_more(&mut self, builder: &mut TreeBuilder) -> Result<SourceStatus, TreeError> {
        let mut delivered = 0;
        while delivered < self.batch {
            match self.events.next() {
                Some(event) => {
                    event.play(builder);
                    delivered += 1;
                }
                None => return Ok(SourceStatus::Exhausted),
            }
        }
        if self.events.len() == 0 {
            Ok(SourceStatus::Exhausted)
        } else {
            Ok(SourceStatus::More)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::events::{ContentSink, Event};

    fn doc_events() -> Vec<Event> {
        vec![
            Event::StartDocument,
            Event::open("root"),
            Event::open("a"),
            Event::text("one"),
            Event::close("a"),
            Event::open("b"),
            Event::text("two"),
            Event::close("b"),
            Event::close("root"),
            Event::EndDocument,
        ]
    }

    #[test]
    fn advances_on_demand() {
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(doc_events(), 1));
        assert_eq!(tree.node_count(), 0);
        assert!(tree.advance_if_needed(0).unwrap());
        assert!(tree.node_count() >= 1);
        // Asking for a deep identity pulls construction forward.
        assert!(tree.advance_if_needed(4).unwrap());
        assert!(tree.node_count() >= 5);
    }

    #[test]
    fn out_of_range_after_exhaustion() {
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(doc_events(), 3));
        assert!(!tree.advance_if_needed(500).unwrap());
        assert!(!tree.is_attached());
        // Later queries are plain no-such-node.
        assert!(!tree.advance_if_needed(500).unwrap());
        assert!(tree.parent_of(500).is_none());
    }

    #[test]
    fn links_resolve_through_pump() {
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(doc_events(), 1));
        assert!(tree.advance_if_needed(0).unwrap());
        let root = tree.first_child_of(0).unwrap();
        let a = tree.first_child_of(root).unwrap();
        // next_sibling of <a> is unknown until <b> is built; the read
        // drives the pump.
        let first_elem = tree
            .first_child_of(a)
            .map(|t| tree.parent_of(t).unwrap())
            .unwrap();
        assert_eq!(first_elem, a);
        let b = tree.next_sibling_of(a).unwrap();
        assert_eq!(tree.string_value(b), "two");
    }

    #[test]
    fn detach_is_terminal() {
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(doc_events(), 2));
        assert!(tree.advance_if_needed(1).unwrap());
        tree.detach();
        assert!(!tree.is_attached());
        assert!(!tree.advance_if_needed(50).unwrap());
    }

    struct FailingSource {
        remaining: usize,
    }

    impl EventSource for FailingSource {
        fn deliver_more(&mut self, builder: &mut TreeBuilder) -> Result<SourceStatus, TreeError> {
            if self.remaining == 0 {
                return Err(TreeError::Source("stream corrupt".into()));
            }
            self.remaining -= 1;
            if builder.table().node_count() == 0 {
                builder.start_document();
            }
            builder.start_element("", "x", "x", &[]);
            builder.end_element("", "x", "x");
            Ok(SourceStatus::More)
        }
    }

    #[test]
    fn source_failure_propagates_and_poisons() {
        let tree = IncrementalTree::new(TreeBuilder::new(), FailingSource { remaining: 2 });
        let err = tree.advance_if_needed(5000).unwrap_err();
        assert!(matches!(err, TreeError::Source(_)));
        assert_eq!(tree.error(), Some(err));
        // Trait reads degrade to unavailable rather than failing.
        assert!(!tree.available(5000));
    }

    #[test]
    fn element_by_id_pumps_until_seen() {
        let mut attr = crate::build::OwnedAttr::new("key", "deep");
        attr.is_id = true;
        let events = vec![
            Event::StartDocument,
            Event::open("root"),
            Event::open("filler"),
            Event::close("filler"),
            Event::open_with("target", vec![attr]),
            Event::close("target"),
            Event::close("root"),
            Event::EndDocument,
        ];
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(events, 1));
        let found = tree.element_by_id("deep").unwrap();
        assert_eq!(tree.node_name(found), "target");
        assert_eq!(tree.element_by_id("absent"), None);
    }

    #[test]
    fn into_table_builds_everything() {
        let tree = IncrementalTree::new(TreeBuilder::new(), VecSource::new(doc_events(), 2));
        let table = tree.into_table().unwrap();
        assert!(table.is_sealed());
        let root = table.first_child_of(0).unwrap();
        assert_eq!(table.string_value(root), "onetwo");
    }
}
