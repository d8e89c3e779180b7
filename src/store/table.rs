//! Document table: parallel per-node columns plus point queries
//!
//! One row per node identity across several `SegList` columns:
//!
//! - `exp_type`: expanded-type id (kind + name, via the name table)
//! - `parent`, `first_child`, `next_sibling`, optional `prev_sibling`:
//!   link columns holding identities or the NULL sentinel
//! - `data`: polymorphic slot. Text/CDATA: inline packed (offset, len)
//!   or a negative auxiliary-table reference. Elements: pooled
//!   qualified-name id when a prefix was present. Attributes: value
//!   index, or a negative auxiliary reference to (qname id, value
//!   index) when prefixed. Comments/PIs/namespace nodes: value index.
//!
//! The auxiliary table reserves slot 0 so a zero data slot stays
//! unambiguous everywhere.

use std::borrow::Cow;
use std::collections::HashMap;

use super::names::{ExpandedNameTable, StringPool};
use super::seglist::SegList;
use super::text::{is_xml_space, pack_span, span_len, span_offset, TextBuffer};
use super::{NodeId, NodeKind, TreeAccess, NULL};

/// Source position captured at node-append time when location tracking
/// is enabled. `system_id` is a string-pool id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    /// Pooled system-id string.
    pub system_id: u32,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// Sizes of every growable structure, recorded by the rollback variant.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pub(crate) count: usize,
    pub(crate) text_end: usize,
    pub(crate) aux_len: usize,
    pub(crate) values_len: usize,
    pub(crate) doc_roots_len: usize,
    pub(crate) id_log_len: usize,
    pub(crate) unparsed_len: usize,
    pub(crate) locations_len: usize,
}

/// The columnar document store.
#[derive(Debug)]
pub struct DocTable {
    exp_type: SegList<u32>,
    parent: SegList<i32>,
    first_child: SegList<i32>,
    next_sibling: SegList<i32>,
    prev_sibling: Option<SegList<i32>>,
    data: SegList<i32>,
    /// Overflow records referenced by negative data slots; slot 0 reserved.
    aux: Vec<i32>,
    /// Character store for text/CDATA runs.
    text: TextBuffer,
    /// Ordered value list: pooled string ids for attribute, comment, PI
    /// and namespace-node values.
    values: Vec<u32>,
    strings: StringPool,
    names: ExpandedNameTable,
    /// value string id -> owning element, first declaration wins.
    id_index: HashMap<u32, NodeId>,
    /// Insertion order of `id_index` keys, so rollback can undo them.
    id_log: Vec<u32>,
    /// expanded type -> element identities in document order.
    type_index: Option<HashMap<u32, Vec<NodeId>>>,
    /// (name id, system id) pairs from unparsed-entity declarations.
    unparsed: Vec<(u32, u32)>,
    locations: Option<Vec<SourceLocation>>,
    /// Document nodes in append order; one entry per appended tree.
    doc_roots: Vec<NodeId>,
    count: usize,
    sealed: bool,
}

impl DocTable {
    pub(crate) fn with_options(
        track_prev_sibling: bool,
        index_elements: bool,
        track_locations: bool,
    ) -> Self {
        DocTable {
            exp_type: SegList::new(),
            parent: SegList::new(),
            first_child: SegList::new(),
            next_sibling: SegList::new(),
            prev_sibling: track_prev_sibling.then(SegList::new),
            data: SegList::new(),
            aux: vec![0],
            text: TextBuffer::new(),
            values: Vec::new(),
            strings: StringPool::new(),
            names: ExpandedNameTable::new(),
            id_index: HashMap::new(),
            id_log: Vec::new(),
            type_index: index_elements.then(HashMap::new),
            unparsed: Vec::new(),
            locations: track_locations.then(Vec::new),
            doc_roots: Vec::new(),
            count: 0,
            sealed: false,
        }
    }

    /// Build a table eagerly from a complete owned event sequence.
    pub fn from_events(events: &[crate::build::Event]) -> Self {
        let mut builder = crate::build::TreeBuilder::new();
        crate::build::play_all(events, &mut builder);
        builder.finish()
    }

    // ------------------------------------------------------------------
    // Append path (tree builder only)
    // ------------------------------------------------------------------

    pub(crate) fn append_node(
        &mut self,
        exp: u32,
        parent: i32,
        first_child: i32,
        next_sibling: i32,
        data: i32,
    ) -> NodeId {
        assert!(!self.sealed, "append into a sealed table");
        assert!(
            self.count < i32::MAX as usize,
            "node identity space exhausted"
        );
        let id = self.count as NodeId;
        self.exp_type.push(exp);
        self.parent.push(parent);
        self.first_child.push(first_child);
        self.next_sibling.push(next_sibling);
        if let Some(prev) = self.prev_sibling.as_mut() {
            prev.push(NULL);
        }
        self.data.push(data);
        self.count += 1;
        id
    }

    pub(crate) fn set_first_child(&mut self, id: NodeId, value: i32) {
        self.first_child.set(id as usize, value);
    }

    pub(crate) fn set_next_sibling(&mut self, id: NodeId, value: i32) {
        self.next_sibling.set(id as usize, value);
    }

    pub(crate) fn set_prev_sibling(&mut self, id: NodeId, value: i32) {
        if let Some(prev) = self.prev_sibling.as_mut() {
            prev.set(id as usize, value);
        }
    }

    /// Store a text span, inline when it fits, through the auxiliary
    /// table otherwise. Returns the data-slot value.
    pub(crate) fn encode_text_span(&mut self, offset: usize, len: usize) -> i32 {
        match pack_span(offset, len) {
            Some(packed) => packed,
            None => self.push_aux2(offset as i32, len as i32),
        }
    }

    /// Append a two-integer overflow record, returning the negative
    /// data-slot reference.
    pub(crate) fn push_aux2(&mut self, a: i32, b: i32) -> i32 {
        let idx = self.aux.len();
        self.aux.push(a);
        self.aux.push(b);
        -(idx as i32)
    }

    /// Append a value string, returning its index in the value list.
    pub(crate) fn push_value(&mut self, value: &str) -> i32 {
        let pooled = self.strings.intern(value);
        self.values.push(pooled);
        (self.values.len() - 1) as i32
    }

    /// Append an already-pooled value string by id.
    pub(crate) fn push_value_id(&mut self, pooled: u32) -> i32 {
        self.values.push(pooled);
        (self.values.len() - 1) as i32
    }

    pub(crate) fn text(&self) -> &TextBuffer {
        &self.text
    }

    pub(crate) fn record_unparsed_entity(&mut self, name: &str, system_id: &str) {
        let name = self.strings.intern(name);
        let system_id = self.strings.intern(system_id);
        self.unparsed.push((name, system_id));
    }

    pub(crate) fn push_location(&mut self, loc: SourceLocation) {
        if let Some(locations) = self.locations.as_mut() {
            locations.push(loc);
        }
    }

    pub(crate) fn locations_enabled(&self) -> bool {
        self.locations.is_some()
    }

    pub(crate) fn register_document(&mut self, id: NodeId) {
        self.doc_roots.push(id);
    }

    pub(crate) fn record_id(&mut self, value: &str, element: NodeId) {
        let key = self.strings.intern(value);
        if let std::collections::hash_map::Entry::Vacant(slot) = self.id_index.entry(key) {
            slot.insert(element);
            self.id_log.push(key);
        }
    }

    pub(crate) fn index_element(&mut self, exp: u32, id: NodeId) {
        if let Some(index) = self.type_index.as_mut() {
            index.entry(exp).or_default().push(id);
        }
    }

    pub(crate) fn strings_mut(&mut self) -> &mut StringPool {
        &mut self.strings
    }

    pub(crate) fn names_mut(&mut self) -> &mut ExpandedNameTable {
        &mut self.names
    }

    pub(crate) fn text_mut(&mut self) -> &mut TextBuffer {
        &mut self.text
    }

    /// Node count and every parallel structure must agree; drift means a
    /// builder invariant was violated and the store is unusable.
    pub(crate) fn assert_parallel_consistency(&self) {
        let extra = usize::from(self.sealed);
        assert_eq!(self.exp_type.len(), self.count + extra);
        assert_eq!(self.parent.len(), self.count + extra);
        assert_eq!(self.first_child.len(), self.count + extra);
        assert_eq!(self.next_sibling.len(), self.count + extra);
        assert_eq!(self.data.len(), self.count + extra);
        if let Some(prev) = self.prev_sibling.as_ref() {
            assert_eq!(prev.len(), self.count + extra);
        }
        if let Some(locations) = self.locations.as_ref() {
            assert_eq!(
                locations.len(),
                self.count,
                "source-location records out of step with node count"
            );
        }
    }

    // ------------------------------------------------------------------
    // Checkpoint support (rollback variant)
    // ------------------------------------------------------------------

    pub(crate) fn record_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            count: self.count,
            text_end: self.text.end(),
            aux_len: self.aux.len(),
            values_len: self.values.len(),
            doc_roots_len: self.doc_roots.len(),
            id_log_len: self.id_log.len(),
            unparsed_len: self.unparsed.len(),
            locations_len: self.locations.as_ref().map_or(0, Vec::len),
        }
    }

    /// Truncate every growable structure back to the checkpointed sizes.
    /// Returns true when the store is completely empty afterwards.
    pub(crate) fn rollback_to(&mut self, mark: &Checkpoint) -> bool {
        debug_assert!(!self.sealed);
        self.exp_type.truncate(mark.count);
        self.parent.truncate(mark.count);
        self.first_child.truncate(mark.count);
        self.next_sibling.truncate(mark.count);
        if let Some(prev) = self.prev_sibling.as_mut() {
            prev.truncate(mark.count);
        }
        self.data.truncate(mark.count);
        self.aux.truncate(mark.aux_len);
        self.text.truncate_to(mark.text_end);
        self.values.truncate(mark.values_len);
        self.doc_roots.truncate(mark.doc_roots_len);
        self.unparsed.truncate(mark.unparsed_len);
        if let Some(locations) = self.locations.as_mut() {
            locations.truncate(mark.locations_len);
        }
        let undone: Vec<u32> = self.id_log.drain(mark.id_log_len..).collect();
        for key in undone {
            self.id_index.remove(&key);
        }
        self.count = mark.count;
        self.count == 0
    }

    // ------------------------------------------------------------------
    // Raw column reads (crate internal; sentinels exposed)
    // ------------------------------------------------------------------

    #[inline]
    pub(crate) fn raw_exp(&self, id: NodeId) -> Option<u32> {
        let idx = id as usize;
        if idx < self.count {
            self.exp_type.get(idx)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn raw_parent(&self, id: NodeId) -> Option<i32> {
        let idx = id as usize;
        if idx < self.count {
            self.parent.get(idx)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn raw_first_child(&self, id: NodeId) -> Option<i32> {
        let idx = id as usize;
        if idx < self.count {
            self.first_child.get(idx)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn raw_next_sibling(&self, id: NodeId) -> Option<i32> {
        let idx = id as usize;
        if idx < self.count {
            self.next_sibling.get(idx)
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn raw_data(&self, id: NodeId) -> Option<i32> {
        let idx = id as usize;
        if idx < self.count {
            self.data.get(idx)
        } else {
            None
        }
    }

    pub(crate) fn exp_blocks(&self) -> &SegList<u32> {
        &self.exp_type
    }

    pub(crate) fn parent_blocks(&self) -> &SegList<i32> {
        &self.parent
    }

    pub(crate) fn first_child_blocks(&self) -> &SegList<i32> {
        &self.first_child
    }

    pub(crate) fn next_sibling_blocks(&self) -> &SegList<i32> {
        &self.next_sibling
    }

    // ------------------------------------------------------------------
    // Point queries
    // ------------------------------------------------------------------

    /// Number of built nodes (terminator row excluded).
    #[inline]
    pub fn node_count(&self) -> usize {
        self.count
    }

    /// The intern pool backing every name and value string.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// The expanded-name table.
    pub fn names(&self) -> &ExpandedNameTable {
        &self.names
    }

    /// Raw kind of a node, derived from its expanded type.
    #[inline]
    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.raw_exp(id).and_then(|exp| self.names.kind_of(exp))
    }

    /// Expanded-type id of a node.
    #[inline]
    pub fn expanded_type(&self, id: NodeId) -> Option<u32> {
        self.raw_exp(id)
    }

    /// Structural parent.
    #[inline]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.raw_parent(id)
            .and_then(|raw| (raw >= 0).then_some(raw as NodeId))
    }

    /// First child. The construction-time "not yet processed" sentinel
    /// reads as `None`; the incremental tree resolves it by pumping.
    #[inline]
    pub fn first_child_of(&self, id: NodeId) -> Option<NodeId> {
        self.raw_first_child(id)
            .and_then(|raw| (raw >= 0).then_some(raw as NodeId))
    }

    /// Next sibling.
    #[inline]
    pub fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        self.raw_next_sibling(id)
            .and_then(|raw| (raw >= 0).then_some(raw as NodeId))
    }

    /// Previous sibling, when the build tracked the column.
    #[inline]
    pub fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        let prev = self.prev_sibling.as_ref()?;
        let idx = id as usize;
        if idx >= self.count {
            return None;
        }
        prev.get(idx)
            .and_then(|raw| (raw >= 0).then_some(raw as NodeId))
    }

    /// Document node of the first appended tree.
    pub fn document_root(&self) -> NodeId {
        self.doc_roots.first().copied().unwrap_or(0)
    }

    /// Document node of the most recently appended tree.
    pub fn current_document(&self) -> NodeId {
        self.doc_roots.last().copied().unwrap_or(0)
    }

    /// Document node owning `id`.
    pub fn document_of(&self, id: NodeId) -> NodeId {
        match self.doc_roots.binary_search(&id) {
            Ok(pos) => self.doc_roots[pos],
            Err(0) => self.document_root(),
            Err(pos) => self.doc_roots[pos - 1],
        }
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    /// Namespace URI, "" when the node has none.
    pub fn namespace_uri(&self, id: NodeId) -> &str {
        match self.raw_exp(id).and_then(|exp| self.names.entry(exp)) {
            Some(entry) => self.strings.get(entry.uri),
            None => "",
        }
    }

    /// Local name: element/attribute local part, PI target, namespace
    /// prefix. "" for unnamed kinds.
    pub fn local_name(&self, id: NodeId) -> &str {
        match self.raw_exp(id).and_then(|exp| self.names.entry(exp)) {
            Some(entry) => self.strings.get(entry.local),
            None => "",
        }
    }

    /// The explicit qualified name carried by the node, if one was
    /// stored at build time (only when a non-default prefix was
    /// present).
    pub fn stored_qname(&self, id: NodeId) -> Option<&str> {
        let data = self.raw_data(id)?;
        match self.node_kind(id)? {
            NodeKind::Element if data > 0 => Some(self.strings.get(data as u32)),
            NodeKind::Attribute if data < 0 => {
                let idx = (-data) as usize;
                Some(self.strings.get(self.aux[idx] as u32))
            }
            _ => None,
        }
    }

    /// Namespace prefix, split out of the stored qualified name. "" when
    /// the node carries no prefix.
    pub fn prefix(&self, id: NodeId) -> &str {
        match self.stored_qname(id) {
            Some(qname) => match memchr::memchr(b':', qname.as_bytes()) {
                Some(pos) => &qname[..pos],
                None => "",
            },
            None => "",
        }
    }

    /// DOM-style node name: qualified name where one exists, pseudo-name
    /// for unnamed kinds.
    pub fn node_name(&self, id: NodeId) -> &str {
        match self.node_kind(id) {
            None => "",
            Some(NodeKind::Document) => "#document",
            Some(NodeKind::DocumentFragment) => "#document-fragment",
            Some(NodeKind::Text) => "#text",
            Some(NodeKind::CData) => "#cdata-section",
            Some(NodeKind::Comment) => "#comment",
            Some(NodeKind::Element) | Some(NodeKind::Attribute) => self
                .stored_qname(id)
                .unwrap_or_else(|| self.local_name(id)),
            Some(NodeKind::ProcessingInstruction) | Some(NodeKind::Namespace) => {
                self.local_name(id)
            }
        }
    }

    /// XPath-style name: resolved local name, "" for kinds whose DOM
    /// name is a pseudo-name.
    pub fn node_name_x(&self, id: NodeId) -> &str {
        match self.node_kind(id) {
            Some(NodeKind::Element)
            | Some(NodeKind::Attribute)
            | Some(NodeKind::ProcessingInstruction)
            | Some(NodeKind::Namespace) => self.local_name(id),
            _ => "",
        }
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Decode a text/CDATA node's (offset, len) span.
    pub(crate) fn text_span(&self, id: NodeId) -> Option<(usize, usize)> {
        let data = self.raw_data(id)?;
        if data >= 0 {
            Some((span_offset(data), span_len(data)))
        } else {
            let idx = (-data) as usize;
            Some((self.aux[idx] as usize, self.aux[idx + 1] as usize))
        }
    }

    pub(crate) fn text_slice(&self, offset: usize, len: usize) -> &str {
        self.text.slice(offset, len)
    }

    fn value_at(&self, index: i32) -> Option<&str> {
        let pooled = self.values.get(usize::try_from(index).ok()?)?;
        Some(self.strings.get(*pooled))
    }

    fn attr_value(&self, id: NodeId) -> Option<&str> {
        let data = self.raw_data(id)?;
        if data >= 0 {
            self.value_at(data)
        } else {
            let idx = (-data) as usize;
            self.value_at(self.aux[idx + 1])
        }
    }

    /// DOM-style node value: text content, attribute/namespace value,
    /// comment text, PI data. `None` for container kinds.
    pub fn node_value(&self, id: NodeId) -> Option<&str> {
        match self.node_kind(id)? {
            NodeKind::Text | NodeKind::CData => {
                let (offset, len) = self.text_span(id)?;
                Some(self.text.slice(offset, len))
            }
            NodeKind::Attribute | NodeKind::Namespace => self.attr_value(id),
            NodeKind::Comment | NodeKind::ProcessingInstruction => {
                self.value_at(self.raw_data(id)?)
            }
            NodeKind::Document | NodeKind::Element | NodeKind::DocumentFragment => None,
        }
    }

    /// Walk the subtree under `start` in identity order, feeding every
    /// text/CDATA slice to `f`. The scan ends at the first identity
    /// whose parent falls below `start`, which is the first node outside
    /// the subtree in pre-order.
    fn for_each_text_span<F: FnMut(&str)>(&self, start: NodeId, mut f: F) {
        let bound = start as i32;
        let mut i = start as usize + 1;
        while i < self.count {
            match self.parent.get(i) {
                Some(raw) if raw >= bound => {}
                _ => break,
            }
            if matches!(
                self.node_kind(i as NodeId),
                Some(NodeKind::Text) | Some(NodeKind::CData)
            ) {
                if let Some((offset, len)) = self.text_span(i as NodeId) {
                    f(self.text.slice(offset, len));
                }
            }
            i += 1;
        }
    }

    /// XPath string-value. Containers concatenate every descendant
    /// text/CDATA span in document order; leaves return their stored
    /// content. Always a string, "" for empty or unavailable nodes.
    pub fn string_value(&self, id: NodeId) -> Cow<'_, str> {
        match self.node_kind(id) {
            Some(NodeKind::Text) | Some(NodeKind::CData) => {
                let (offset, len) = self.text_span(id).unwrap_or((0, 0));
                Cow::Borrowed(self.text.slice(offset, len))
            }
            Some(NodeKind::Document)
            | Some(NodeKind::Element)
            | Some(NodeKind::DocumentFragment) => {
                let mut out = String::new();
                self.for_each_text_span(id, |chunk| out.push_str(chunk));
                Cow::Owned(out)
            }
            Some(NodeKind::Attribute)
            | Some(NodeKind::Comment)
            | Some(NodeKind::ProcessingInstruction)
            | Some(NodeKind::Namespace) => Cow::Borrowed(self.node_value(id).unwrap_or("")),
            None => Cow::Borrowed(""),
        }
    }

    fn emit_value_chunks<F: FnMut(&str)>(&self, id: NodeId, mut f: F) {
        match self.node_kind(id) {
            Some(NodeKind::Text) | Some(NodeKind::CData) => {
                if let Some((offset, len)) = self.text_span(id) {
                    f(self.text.slice(offset, len));
                }
            }
            Some(NodeKind::Document)
            | Some(NodeKind::Element)
            | Some(NodeKind::DocumentFragment) => self.for_each_text_span(id, f),
            Some(_) => f(self.node_value(id).unwrap_or("")),
            None => {}
        }
    }

    /// Re-emit the string-value as character callbacks, one chunk per
    /// stored span, without materializing the concatenation. With
    /// `normalize` the emission applies the XPath normalize-space rule:
    /// leading/trailing whitespace dropped, internal runs collapsed to a
    /// single space.
    pub fn dispatch_characters<S: CharacterSink + ?Sized>(
        &self,
        id: NodeId,
        sink: &mut S,
        normalize: bool,
    ) {
        if normalize {
            let mut state = SpaceNormalizer::default();
            self.emit_value_chunks(id, |chunk| state.feed(chunk, sink));
        } else {
            self.emit_value_chunks(id, |chunk| sink.characters(chunk));
        }
    }

    // ------------------------------------------------------------------
    // Attribute and namespace runs
    // ------------------------------------------------------------------

    fn scan_attr_run(&self, mut i: usize, want: NodeKind) -> Option<NodeId> {
        loop {
            let kind = self.node_kind(i as NodeId)?;
            if !kind.is_attribute_like() {
                return None;
            }
            if kind == want {
                return Some(i as NodeId);
            }
            i += 1;
        }
    }

    /// First attribute of an element; attributes and namespace nodes
    /// form a contiguous run immediately after the owner.
    pub fn first_attribute(&self, id: NodeId) -> Option<NodeId> {
        if self.node_kind(id)? != NodeKind::Element {
            return None;
        }
        self.scan_attr_run(id as usize + 1, NodeKind::Attribute)
    }

    /// Next attribute after an attribute node.
    pub fn next_attribute(&self, id: NodeId) -> Option<NodeId> {
        if self.node_kind(id)? != NodeKind::Attribute {
            return None;
        }
        self.scan_attr_run(id as usize + 1, NodeKind::Attribute)
    }

    /// First namespace node of an element.
    pub fn first_namespace_node(&self, id: NodeId) -> Option<NodeId> {
        if self.node_kind(id)? != NodeKind::Element {
            return None;
        }
        self.scan_attr_run(id as usize + 1, NodeKind::Namespace)
    }

    /// Next namespace node after a namespace node.
    pub fn next_namespace_node(&self, id: NodeId) -> Option<NodeId> {
        if self.node_kind(id)? != NodeKind::Namespace {
            return None;
        }
        self.scan_attr_run(id as usize + 1, NodeKind::Namespace)
    }

    /// Attribute of `element` matching (uri, local), if present.
    pub fn attribute_node(&self, element: NodeId, uri: &str, local: &str) -> Option<NodeId> {
        let mut attr = self.first_attribute(element);
        while let Some(a) = attr {
            if self.local_name(a) == local && self.namespace_uri(a) == uri {
                return Some(a);
            }
            attr = self.next_attribute(a);
        }
        None
    }

    /// Element owning an ID-typed attribute with the given value.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        let key = self.strings.find(value)?;
        self.id_index.get(&key).copied()
    }

    /// Elements of one expanded type in document order, when indexing
    /// was enabled at build time. Empty otherwise.
    pub fn indexed_elements(&self, exp: u32) -> &[NodeId] {
        self.type_index
            .as_ref()
            .and_then(|index| index.get(&exp))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// System id declared for an unparsed entity, "" when unknown. The
    /// most recent declaration wins.
    pub fn unparsed_entity_uri(&self, name: &str) -> &str {
        let Some(key) = self.strings.find(name) else {
            return "";
        };
        self.unparsed
            .iter()
            .rev()
            .find(|(n, _)| *n == key)
            .map(|(_, sys)| self.strings.get(*sys))
            .unwrap_or("")
    }

    /// Source position captured for a node, when tracking was enabled.
    pub fn source_location(&self, id: NodeId) -> Option<(&str, u32, u32)> {
        let loc = self.locations.as_ref()?.get(id as usize)?;
        Some((self.strings.get(loc.system_id), loc.line, loc.column))
    }

    // ------------------------------------------------------------------
    // Sealing (compact accessor precondition)
    // ------------------------------------------------------------------

    /// Append the terminator row so raw identity scans can read one past
    /// the last node, and freeze the table against further appends.
    /// Idempotent.
    pub fn seal(&mut self) {
        if self.sealed {
            return;
        }
        self.exp_type.push(u32::MAX);
        self.parent.push(NULL);
        self.first_child.push(NULL);
        self.next_sibling.push(NULL);
        if let Some(prev) = self.prev_sibling.as_mut() {
            prev.push(NULL);
        }
        self.data.push(0);
        self.sealed = true;
    }

    /// True once [`DocTable::seal`] has run.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

impl TreeAccess for DocTable {
    fn node_count(&self) -> usize {
        self.count
    }

    fn available(&self, id: NodeId) -> bool {
        (id as usize) < self.count
    }

    fn expanded_type(&self, id: NodeId) -> Option<u32> {
        DocTable::expanded_type(self, id)
    }

    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        DocTable::node_kind(self, id)
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        DocTable::parent_of(self, id)
    }

    fn first_child_of(&self, id: NodeId) -> Option<NodeId> {
        DocTable::first_child_of(self, id)
    }

    fn next_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        DocTable::next_sibling_of(self, id)
    }

    fn prev_sibling_of(&self, id: NodeId) -> Option<NodeId> {
        DocTable::prev_sibling_of(self, id)
    }

    fn current_document(&self) -> NodeId {
        DocTable::current_document(self)
    }

    fn document_of(&self, id: NodeId) -> NodeId {
        DocTable::document_of(self, id)
    }
}

/// Receiver for [`DocTable::dispatch_characters`].
pub trait CharacterSink {
    /// One chunk of character content.
    fn characters(&mut self, chunk: &str);
}

impl CharacterSink for String {
    fn characters(&mut self, chunk: &str) {
        self.push_str(chunk);
    }
}

/// Streaming normalize-space state. Word pieces split across adjacent
/// spans join without a separator; whitespace between words collapses to
/// one space.
#[derive(Default)]
struct SpaceNormalizer {
    pending_space: bool,
    emitted: bool,
}

impl SpaceNormalizer {
    fn feed<S: CharacterSink + ?Sized>(&mut self, chunk: &str, sink: &mut S) {
        let bytes = chunk.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if is_xml_space(bytes[i]) {
                if self.emitted {
                    self.pending_space = true;
                }
                i += 1;
            } else {
                let start = i;
                while i < bytes.len() && !is_xml_space(bytes[i]) {
                    i += 1;
                }
                if self.pending_space {
                    sink.characters(" ");
                    self.pending_space = false;
                }
                sink.characters(&chunk[start..i]);
                self.emitted = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NOT_PROCESSED;

    /// Hand-assemble document -> element -> text without the builder.
    fn tiny_table() -> DocTable {
        let mut t = DocTable::with_options(false, false, false);
        let doc_exp = NodeKind::Document.raw();
        let doc = t.append_node(doc_exp, NULL, NOT_PROCESSED, NULL, 0);
        t.register_document(doc);

        let uri = t.strings_mut().intern("");
        let local = t.strings_mut().intern("a");
        let exp = t.names_mut().assign(uri, local, NodeKind::Element);
        let elem = t.append_node(exp, doc as i32, NOT_PROCESSED, NULL, 0);
        t.set_first_child(doc, elem as i32);

        let start = t.text_mut().end();
        t.text_mut().push_str("xy");
        let data = t.encode_text_span(start, 2);
        let text = t.append_node(NodeKind::Text.raw(), elem as i32, NULL, NULL, data);
        t.set_first_child(elem, text as i32);
        t
    }

    #[test]
    fn point_queries() {
        let t = tiny_table();
        assert_eq!(t.node_count(), 3);
        assert_eq!(t.node_kind(0), Some(NodeKind::Document));
        assert_eq!(t.node_kind(1), Some(NodeKind::Element));
        assert_eq!(t.parent_of(1), Some(0));
        assert_eq!(t.first_child_of(1), Some(2));
        assert_eq!(t.next_sibling_of(2), None);
        assert_eq!(t.parent_of(0), None);
        assert_eq!(t.node_kind(99), None);
    }

    #[test]
    fn names_and_values() {
        let t = tiny_table();
        assert_eq!(t.node_name(0), "#document");
        assert_eq!(t.node_name(1), "a");
        assert_eq!(t.node_name(2), "#text");
        assert_eq!(t.node_name_x(1), "a");
        assert_eq!(t.node_name_x(2), "");
        assert_eq!(t.node_value(2), Some("xy"));
        assert_eq!(t.node_value(1), None);
    }

    #[test]
    fn string_value_concatenates() {
        let t = tiny_table();
        assert_eq!(t.string_value(1), "xy");
        assert_eq!(t.string_value(0), "xy");
        assert_eq!(t.string_value(2), "xy");
        assert_eq!(t.string_value(42), "");
    }

    #[test]
    fn seal_appends_terminator_once() {
        let mut t = tiny_table();
        t.seal();
        t.seal();
        assert!(t.is_sealed());
        assert_eq!(t.node_count(), 3);
        // The terminator is invisible to queries.
        assert_eq!(t.node_kind(3), None);
    }

    #[test]
    fn rollback_restores_sizes() {
        let mut t = tiny_table();
        let mark = t.record_checkpoint();
        let start = t.text_mut().end();
        t.text_mut().push_str("later");
        let data = t.encode_text_span(start, 5);
        t.append_node(NodeKind::Text.raw(), 1, NULL, NULL, data);
        t.record_id("k1", 1);
        assert_eq!(t.node_count(), 4);
        assert_eq!(t.element_by_id("k1"), Some(1));

        let empty = t.rollback_to(&mark);
        assert!(!empty);
        assert_eq!(t.node_count(), 3);
        assert_eq!(t.element_by_id("k1"), None);
        assert_eq!(t.string_value(1), "xy");
    }

    #[test]
    fn normalize_space_dispatch() {
        let mut t = DocTable::with_options(false, false, false);
        let doc = t.append_node(NodeKind::Document.raw(), NULL, NOT_PROCESSED, NULL, 0);
        t.register_document(doc);
        let local = t.strings_mut().intern("e");
        let exp = t.names_mut().assign(0, local, NodeKind::Element);
        let elem = t.append_node(exp, 0, NOT_PROCESSED, NULL, 0);
        t.set_first_child(doc, elem as i32);
        let start = t.text_mut().end();
        t.text_mut().push_str("  a   b  ");
        let data = t.encode_text_span(start, 9);
        let text = t.append_node(NodeKind::Text.raw(), elem as i32, NULL, NULL, data);
        t.set_first_child(elem, text as i32);

        let mut out = String::new();
        t.dispatch_characters(elem, &mut out, true);
        assert_eq!(out, "a b");

        let mut raw = String::new();
        t.dispatch_characters(elem, &mut raw, false);
        assert_eq!(raw, "  a   b  ");
    }
}
