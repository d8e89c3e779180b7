//! Tree builder: event stream -> columnar store
//!
//! Consumes [`ContentSink`] notifications and appends rows to a
//! [`DocTable`], keeping only transient construction state here: the
//! open-element stack, the previous-sibling cursor, the pending text
//! run, and the namespace binding list with its per-element checkpoints.
//!
//! Link columns are appended with the NOT_PROCESSED sentinel and
//! resolved as construction catches up: a node's next sibling is fixed
//! when the sibling arrives or when the parent closes, an element's
//! first child when the element closes. The sentinel never survives
//! end-of-document.

use tracing::debug;

use super::events::{Attr, ContentSink};
use crate::store::table::{DocTable, SourceLocation};
use crate::store::{NodeId, NodeKind, NOT_PROCESSED, NULL};
use crate::TreeError;

/// The implicit `xml` prefix binding every document carries.
pub const XML_NAMESPACE_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Tombstone URI id for a binding ended inside its scope.
const TOMBSTONE: u32 = u32::MAX;

/// Build-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildConfig {
    /// Discard all-whitespace text runs instead of creating nodes.
    pub strip_whitespace: bool,
    /// Maintain the previous-sibling column.
    pub track_prev_sibling: bool,
    /// Maintain the expanded-type element index for typed lookups.
    pub index_elements: bool,
    /// Record a (system id, line, column) per node.
    pub track_locations: bool,
    /// Accept several documents into one store and keep the builder
    /// open between them (rollback variant). Incompatible with
    /// `index_elements`: index entries cannot be unwound on rollback.
    pub multi_document: bool,
}

#[derive(Debug, Clone, Copy)]
struct NsBinding {
    prefix: u32,
    uri: u32,
}

#[derive(Debug, Clone, Copy)]
struct TextRun {
    start: usize,
    all_cdata: bool,
}

/// Incremental consumer of construction events.
#[derive(Debug)]
pub struct TreeBuilder {
    table: DocTable,
    config: BuildConfig,
    /// Open-element stack; bottom entry is the document node.
    parents: Vec<i32>,
    /// Last sibling appended at the current depth, NULL if none yet.
    previous: i32,
    text_run: Option<TextRun>,
    in_cdata: bool,
    in_dtd: bool,
    /// Flat binding list; truncated to the owner's checkpoint on
    /// end-element, tombstoned in place by end-prefix-mapping.
    ns_bindings: Vec<NsBinding>,
    ns_checkpoints: Vec<usize>,
    first_element_seen: bool,
    location: SourceLocation,
}

impl TreeBuilder {
    /// Builder with default options.
    pub fn new() -> Self {
        Self::unchecked(BuildConfig::default())
    }

    /// Builder with explicit options. Fails on invalid combinations.
    pub fn with_config(config: BuildConfig) -> Result<Self, TreeError> {
        if config.multi_document && config.index_elements {
            return Err(TreeError::Config(
                "rollback and element indexing are mutually exclusive",
            ));
        }
        Ok(Self::unchecked(config))
    }

    fn unchecked(config: BuildConfig) -> Self {
        TreeBuilder {
            table: DocTable::with_options(
                config.track_prev_sibling,
                config.index_elements,
                config.track_locations,
            ),
            config,
            parents: Vec::with_capacity(32),
            previous: NULL,
            text_run: None,
            in_cdata: false,
            in_dtd: false,
            ns_bindings: Vec::with_capacity(16),
            ns_checkpoints: Vec::with_capacity(32),
            first_element_seen: false,
            location: SourceLocation {
                system_id: 0,
                line: 0,
                column: 0,
            },
        }
    }

    /// The store built so far. Valid for every identity below
    /// `node_count`, including mid-construction.
    pub fn table(&self) -> &DocTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut DocTable {
        &mut self.table
    }

    /// True between start-document and end-document.
    pub fn is_open(&self) -> bool {
        !self.parents.is_empty()
    }

    /// Update the current source position. The event source calls this
    /// as its position advances; every appended node snapshots the
    /// latest value when location tracking is enabled.
    pub fn update_location(&mut self, system_id: &str, line: u32, column: u32) {
        let system_id = self.table.strings_mut().intern(system_id);
        self.location = SourceLocation {
            system_id,
            line,
            column,
        };
    }

    /// Close out a document left open by a truncated event source, then
    /// hand over the finished store. A cleanly closed build passes
    /// through unchanged. Single-document builds are sealed for the
    /// compact accessor.
    pub fn finish(mut self) -> DocTable {
        self.flush_text();
        while let Some(open) = self.parents.pop() {
            self.terminate_scope(open);
        }
        self.table.assert_parallel_consistency();
        if !self.config.multi_document {
            self.table.seal();
        }
        self.table
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    #[inline]
    fn current_parent(&self) -> i32 {
        self.parents.last().copied().unwrap_or(NULL)
    }

    fn append(
        &mut self,
        exp: u32,
        parent: i32,
        first_child: i32,
        next_sibling: i32,
        data: i32,
    ) -> NodeId {
        let id = self
            .table
            .append_node(exp, parent, first_child, next_sibling, data);
        if self.table.locations_enabled() {
            self.table.push_location(self.location);
        }
        id
    }

    /// Insert a content child after the previous-sibling cursor, or as
    /// the parent's first child when the cursor is empty.
    fn link_child(&mut self, parent: i32, child: NodeId) {
        if self.previous != NULL {
            self.table.set_next_sibling(self.previous as NodeId, child as i32);
        } else if parent >= 0 {
            self.table.set_first_child(parent as NodeId, child as i32);
        }
        self.table.set_prev_sibling(child, self.previous);
        self.previous = child as i32;
    }

    /// Close one open scope: terminate the child chain and clear the
    /// first-child sentinel for a childless node.
    fn terminate_scope(&mut self, open: i32) {
        if self.previous != NULL {
            self.table.set_next_sibling(self.previous as NodeId, NULL);
        }
        if open >= 0 && self.table.raw_first_child(open as NodeId) == Some(NOT_PROCESSED) {
            self.table.set_first_child(open as NodeId, NULL);
        }
        self.previous = open;
    }

    /// True when the qualified name carries a non-empty prefix.
    fn has_prefix(qname: &str) -> bool {
        matches!(memchr::memchr(b':', qname.as_bytes()), Some(pos) if pos > 0)
    }

    /// Materialize the pending text run, if any. All-whitespace runs are
    /// dropped under whitespace stripping; zero-length runs never
    /// allocate a node.
    fn flush_text(&mut self) {
        let Some(run) = self.text_run.take() else {
            return;
        };
        let end = self.table.text().end();
        let len = end - run.start;
        if len == 0 {
            return;
        }
        if self.config.strip_whitespace && self.table.text().span_is_whitespace(run.start, len) {
            self.table.text_mut().truncate_to(run.start);
            return;
        }
        let kind = if run.all_cdata {
            NodeKind::CData
        } else {
            NodeKind::Text
        };
        let data = self.table.encode_text_span(run.start, len);
        let parent = self.current_parent();
        let id = self.append(kind.raw(), parent, NULL, NOT_PROCESSED, data);
        self.link_child(parent, id);
    }

    /// Append an attribute or namespace node into the run after the
    /// owner element, chained to the previous run member.
    fn append_attr_like(
        &mut self,
        exp: u32,
        owner: NodeId,
        data: i32,
        prev_attr: &mut i32,
    ) -> NodeId {
        let id = self.append(exp, owner as i32, NULL, NOT_PROCESSED, data);
        if *prev_attr != NULL {
            self.table.set_next_sibling(*prev_attr as NodeId, id as i32);
        }
        self.table.set_prev_sibling(id, *prev_attr);
        *prev_attr = id as i32;
        id
    }

    fn append_namespace_node(
        &mut self,
        owner: NodeId,
        prefix_id: u32,
        uri_id: u32,
        prev_attr: &mut i32,
    ) {
        let exp = self
            .table
            .names_mut()
            .assign(0, prefix_id, NodeKind::Namespace);
        let value_index = self.table.push_value_id(uri_id);
        self.append_attr_like(exp, owner, value_index, prev_attr);
    }

    fn handle_start_element(&mut self, uri: &str, local: &str, qname: &str, attrs: &[Attr<'_>]) {
        self.flush_text();

        let uri_id = self.table.strings_mut().intern(uri);
        let local_id = self.table.strings_mut().intern(local);
        let exp = self
            .table
            .names_mut()
            .assign(uri_id, local_id, NodeKind::Element);
        let data = if Self::has_prefix(qname) {
            self.table.strings_mut().intern(qname) as i32
        } else {
            0
        };

        let parent = self.current_parent();
        let elem = self.append(exp, parent, NOT_PROCESSED, NOT_PROCESSED, data);
        self.table.index_element(exp, elem);
        self.link_child(parent, elem);

        let mut prev_attr = NULL;
        // Prefixes already given a namespace node on this element.
        let mut declared: Vec<u32> = Vec::new();

        if !self.first_element_seen {
            self.first_element_seen = true;
            let xml_prefix = self.table.strings_mut().intern("xml");
            let xml_uri = self.table.strings_mut().intern(XML_NAMESPACE_URI);
            declared.push(xml_prefix);
            self.append_namespace_node(elem, xml_prefix, xml_uri, &mut prev_attr);
        }

        // Bindings announced since the parent's checkpoint belong to
        // this element.
        let scope_base = self.ns_checkpoints.last().copied().unwrap_or(0);
        let fresh: Vec<(u32, u32)> = self.ns_bindings[scope_base..]
            .iter()
            .filter(|b| b.uri != TOMBSTONE)
            .map(|b| (b.prefix, b.uri))
            .collect();
        for (prefix_id, ns_uri_id) in fresh {
            if !declared.contains(&prefix_id) {
                declared.push(prefix_id);
                self.append_namespace_node(elem, prefix_id, ns_uri_id, &mut prev_attr);
            }
        }

        for attr in attrs {
            if attr.qname == "xmlns" || attr.qname.starts_with("xmlns:") {
                // A declaration attribute becomes a namespace node, not
                // an attribute node. The binding list is fed only by
                // prefix-mapping events; their end notifications keep
                // it scoped.
                let prefix = attr.qname.strip_prefix("xmlns:").unwrap_or("");
                let prefix_id = self.table.strings_mut().intern(prefix);
                if !declared.contains(&prefix_id) {
                    declared.push(prefix_id);
                    let ns_uri_id = self.table.strings_mut().intern(attr.value);
                    self.append_namespace_node(elem, prefix_id, ns_uri_id, &mut prev_attr);
                }
                continue;
            }

            let attr_uri = self.table.strings_mut().intern(attr.uri);
            let attr_local = self.table.strings_mut().intern(attr.local);
            let attr_exp = self
                .table
                .names_mut()
                .assign(attr_uri, attr_local, NodeKind::Attribute);
            let value_index = self.table.push_value(attr.value);
            let attr_data = if Self::has_prefix(attr.qname) {
                let qname_id = self.table.strings_mut().intern(attr.qname) as i32;
                self.table.push_aux2(qname_id, value_index)
            } else {
                value_index
            };
            self.append_attr_like(attr_exp, elem, attr_data, &mut prev_attr);
            if attr.is_id {
                self.table.record_id(attr.value, elem);
            }
        }

        // The run is complete; nothing follows the last member.
        if prev_attr != NULL {
            self.table.set_next_sibling(prev_attr as NodeId, NULL);
        }

        self.parents.push(elem as i32);
        self.previous = NULL;
        self.ns_checkpoints.push(self.ns_bindings.len());
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSink for TreeBuilder {
    fn start_document(&mut self) {
        debug_assert!(
            self.parents.is_empty(),
            "start_document inside an open document"
        );
        let id = self.append(NodeKind::Document.raw(), NULL, NOT_PROCESSED, NULL, 0);
        self.table.register_document(id);
        self.parents.push(id as i32);
        self.previous = NULL;
        self.ns_checkpoints.push(self.ns_bindings.len());
        self.first_element_seen = false;
        debug!(document = id, "start document");
    }

    fn end_document(&mut self) {
        self.flush_text();
        if let Some(doc) = self.parents.pop() {
            self.terminate_scope(doc);
        }
        self.previous = NULL;
        self.ns_checkpoints.pop();
        if self.config.multi_document {
            self.ns_bindings.clear();
        } else {
            // Release the construction-only scratch outright.
            self.ns_bindings = Vec::new();
            self.ns_checkpoints = Vec::new();
            self.parents = Vec::new();
        }
        self.table.assert_parallel_consistency();
        debug!(nodes = self.table.node_count(), "end document");
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        let prefix = self.table.strings_mut().intern(prefix);
        let uri = self.table.strings_mut().intern(uri);
        self.ns_bindings.push(NsBinding { prefix, uri });
    }

    fn end_prefix_mapping(&mut self, prefix: &str) {
        let Some(prefix_id) = self.table.strings().find(prefix) else {
            return;
        };
        for binding in self.ns_bindings.iter_mut().rev() {
            if binding.prefix == prefix_id && binding.uri != TOMBSTONE {
                binding.uri = TOMBSTONE;
                return;
            }
        }
    }

    fn start_element(&mut self, uri: &str, local: &str, qname: &str, attrs: &[Attr<'_>]) {
        self.handle_start_element(uri, local, qname, attrs);
    }

    fn end_element(&mut self, _uri: &str, _local: &str, _qname: &str) {
        self.flush_text();
        let scope = self.ns_checkpoints.pop().unwrap_or(0);
        self.ns_bindings.truncate(scope);
        if let Some(elem) = self.parents.pop() {
            self.terminate_scope(elem);
        }
    }

    fn characters(&mut self, text: &str) {
        match self.text_run.as_mut() {
            Some(run) => run.all_cdata &= self.in_cdata,
            None => {
                self.text_run = Some(TextRun {
                    start: self.table.text().end(),
                    all_cdata: self.in_cdata,
                })
            }
        }
        self.table.text_mut().push_str(text);
    }

    fn comment(&mut self, text: &str) {
        if self.in_dtd {
            return;
        }
        self.flush_text();
        let value_index = self.table.push_value(text);
        let parent = self.current_parent();
        let id = self.append(
            NodeKind::Comment.raw(),
            parent,
            NULL,
            NOT_PROCESSED,
            value_index,
        );
        self.link_child(parent, id);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        if self.in_dtd {
            return;
        }
        self.flush_text();
        let target_id = self.table.strings_mut().intern(target);
        let exp = self
            .table
            .names_mut()
            .assign(0, target_id, NodeKind::ProcessingInstruction);
        let value_index = self.table.push_value(data);
        let parent = self.current_parent();
        let id = self.append(exp, parent, NULL, NOT_PROCESSED, value_index);
        self.link_child(parent, id);
    }

    fn start_cdata(&mut self) {
        self.in_cdata = true;
    }

    fn end_cdata(&mut self) {
        self.in_cdata = false;
    }

    fn start_dtd(&mut self, _name: &str, _public_id: Option<&str>, _system_id: Option<&str>) {
        self.in_dtd = true;
    }

    fn end_dtd(&mut self) {
        self.in_dtd = false;
    }

    fn skipped_entity(&mut self, name: &str) {
        tracing::trace!(entity = name, "skipped entity");
    }

    fn unparsed_entity_decl(
        &mut self,
        name: &str,
        _public_id: Option<&str>,
        system_id: Option<&str>,
        _notation: &str,
    ) {
        self.table
            .record_unparsed_entity(name, system_id.unwrap_or(""));
    }

    fn notation_decl(&mut self, name: &str, _public_id: Option<&str>, _system_id: Option<&str>) {
        tracing::trace!(notation = name, "notation declaration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::events::{play_all, Event, OwnedAttr};

    fn build(events: &[Event]) -> DocTable {
        let mut builder = TreeBuilder::new();
        play_all(events, &mut builder);
        builder.finish()
    }

    #[test]
    fn adjacent_characters_coalesce() {
        let table = build(&[
            Event::StartDocument,
            Event::open("a"),
            Event::text("x"),
            Event::text("y"),
            Event::close("a"),
            Event::EndDocument,
        ]);
        // Document, element a, namespace node for xml, one text node.
        assert_eq!(table.node_count(), 4);
        let elem = table.first_child_of(0).unwrap();
        let text = table.first_child_of(elem).unwrap();
        assert_eq!(table.node_kind(text), Some(NodeKind::Text));
        assert_eq!(table.string_value(text), "xy");
        assert_eq!(table.next_sibling_of(text), None);
    }

    #[test]
    fn implicit_xml_namespace_on_first_element() {
        let table = build(&[
            Event::StartDocument,
            Event::open("a"),
            Event::close("a"),
            Event::EndDocument,
        ]);
        let elem = table.first_child_of(0).unwrap();
        let ns = table.first_namespace_node(elem).unwrap();
        assert_eq!(table.node_kind(ns), Some(NodeKind::Namespace));
        assert_eq!(table.local_name(ns), "xml");
        assert_eq!(table.node_value(ns), Some(XML_NAMESPACE_URI));
        // The namespace node is invisible to the child chain.
        assert_eq!(table.first_child_of(elem), None);
    }

    #[test]
    fn whitespace_stripping_discards_run() {
        let mut builder = TreeBuilder::with_config(BuildConfig {
            strip_whitespace: true,
            ..BuildConfig::default()
        })
        .unwrap();
        play_all(
            &[
                Event::StartDocument,
                Event::open("a"),
                Event::text("  \n\t "),
                Event::close("a"),
                Event::EndDocument,
            ],
            &mut builder,
        );
        let table = builder.finish();
        let elem = table.first_child_of(0).unwrap();
        assert_eq!(table.first_child_of(elem), None);
        assert_eq!(table.node_count(), 3); // document, element, xml namespace
    }

    #[test]
    fn cdata_purity_decides_node_kind() {
        let table = build(&[
            Event::StartDocument,
            Event::open("a"),
            Event::StartCdata,
            Event::text("pure"),
            Event::EndCdata,
            Event::close("a"),
            Event::EndDocument,
        ]);
        let elem = table.first_child_of(0).unwrap();
        let node = table.first_child_of(elem).unwrap();
        assert_eq!(table.node_kind(node), Some(NodeKind::CData));

        // A mixed run collapses to an ordinary text node.
        let table = build(&[
            Event::StartDocument,
            Event::open("a"),
            Event::StartCdata,
            Event::text("c"),
            Event::EndCdata,
            Event::text("t"),
            Event::close("a"),
            Event::EndDocument,
        ]);
        let elem = table.first_child_of(0).unwrap();
        let node = table.first_child_of(elem).unwrap();
        assert_eq!(table.node_kind(node), Some(NodeKind::Text));
        assert_eq!(table.string_value(node), "ct");
        assert_eq!(table.next_sibling_of(node), None);
    }

    #[test]
    fn id_attribute_indexes_owner() {
        let mut attr = OwnedAttr::new("key", "n1");
        attr.is_id = true;
        let table = build(&[
            Event::StartDocument,
            Event::open_with("e", vec![attr]),
            Event::close("e"),
            Event::EndDocument,
        ]);
        let elem = table.first_child_of(0).unwrap();
        assert_eq!(table.element_by_id("n1"), Some(elem));
        assert_eq!(table.element_by_id("missing"), None);
    }

    #[test]
    fn xmlns_attribute_becomes_namespace_node() {
        let table = build(&[
            Event::StartDocument,
            Event::StartElement {
                uri: "urn:x".into(),
                local: "a".into(),
                qname: "p:a".into(),
                attrs: vec![OwnedAttr {
                    uri: String::new(),
                    local: "p".into(),
                    qname: "xmlns:p".into(),
                    value: "urn:x".into(),
                    is_id: false,
                }],
            },
            Event::EndElement {
                uri: "urn:x".into(),
                local: "a".into(),
                qname: "p:a".into(),
            },
            Event::EndDocument,
        ]);
        let elem = table.first_child_of(0).unwrap();
        assert_eq!(table.node_name(elem), "p:a");
        assert_eq!(table.local_name(elem), "a");
        assert_eq!(table.namespace_uri(elem), "urn:x");
        assert_eq!(table.prefix(elem), "p");
        // No attribute node was created for the declaration.
        assert_eq!(table.first_attribute(elem), None);
        // Two namespace nodes: implicit xml, then p.
        let ns = table.first_namespace_node(elem).unwrap();
        let ns2 = table.next_namespace_node(ns).unwrap();
        assert_eq!(table.local_name(ns2), "p");
        assert_eq!(table.node_value(ns2), Some("urn:x"));
        assert_eq!(table.next_namespace_node(ns2), None);
    }

    #[test]
    fn comments_and_pis_inside_dtd_are_dropped() {
        let table = build(&[
            Event::StartDocument,
            Event::StartDtd {
                name: "a".into(),
                public_id: None,
                system_id: None,
            },
            Event::Comment("dtd internal".into()),
            Event::ProcessingInstruction {
                target: "skip".into(),
                data: String::new(),
            },
            Event::EndDtd,
            Event::open("a"),
            Event::close("a"),
            Event::EndDocument,
        ]);
        assert_eq!(table.node_count(), 3); // document, element, xml namespace
    }

    #[test]
    fn prefixed_attribute_stores_qname() {
        let table = build(&[
            Event::StartDocument,
            Event::open_with(
                "a",
                vec![OwnedAttr {
                    uri: "urn:y".into(),
                    local: "href".into(),
                    qname: "y:href".into(),
                    value: "target".into(),
                    is_id: false,
                }],
            ),
            Event::close("a"),
            Event::EndDocument,
        ]);
        let elem = table.first_child_of(0).unwrap();
        let attr = table.first_attribute(elem).unwrap();
        assert_eq!(table.node_name(attr), "y:href");
        assert_eq!(table.prefix(attr), "y");
        assert_eq!(table.string_value(attr), "target");
        assert_eq!(table.attribute_node(elem, "urn:y", "href"), Some(attr));
    }

    #[test]
    fn rollback_config_rejects_indexing() {
        let err = TreeBuilder::with_config(BuildConfig {
            multi_document: true,
            index_elements: true,
            ..BuildConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, TreeError::Config(_)));
    }
}
