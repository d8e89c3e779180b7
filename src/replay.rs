//! Subtree replay: table -> events
//!
//! Walks a subtree and re-emits it through the same [`ContentSink`]
//! vocabulary the builder consumes, so any event consumer (another
//! builder included) can receive a stored subtree. Namespace nodes
//! replay as prefix mappings around their element; CDATA nodes replay
//! inside CDATA brackets.

use crate::build::{Attr, ContentSink};
use crate::store::{DocTable, NodeId, NodeKind};

impl DocTable {
    /// Re-emit `id` and everything below it as construction events.
    ///
    /// A document or fragment start node brackets the emission in
    /// start/end-document; any other start node replays as a bare
    /// subtree. Attribute and namespace start nodes emit nothing: they
    /// have no event-stream representation of their own.
    pub fn replay_subtree<S: ContentSink + ?Sized>(&self, id: NodeId, sink: &mut S) {
        match self.node_kind(id) {
            Some(NodeKind::Document) | Some(NodeKind::DocumentFragment) => {
                sink.start_document();
                let mut child = self.first_child_of(id);
                while let Some(node) = child {
                    self.replay_node(node, sink);
                    child = self.next_sibling_of(node);
                }
                sink.end_document();
            }
            Some(NodeKind::Attribute) | Some(NodeKind::Namespace) | None => {}
            Some(_) => self.replay_node(id, sink),
        }
    }

    fn replay_node<S: ContentSink + ?Sized>(&self, id: NodeId, sink: &mut S) {
        match self.node_kind(id) {
            Some(NodeKind::Element) => self.replay_element(id, sink),
            Some(NodeKind::Text) => sink.characters(self.node_value(id).unwrap_or("")),
            Some(NodeKind::CData) => {
                sink.start_cdata();
                sink.characters(self.node_value(id).unwrap_or(""));
                sink.end_cdata();
            }
            Some(NodeKind::Comment) => sink.comment(self.node_value(id).unwrap_or("")),
            Some(NodeKind::ProcessingInstruction) => {
                sink.processing_instruction(self.local_name(id), self.node_value(id).unwrap_or(""))
            }
            _ => {}
        }
    }

    fn replay_element<S: ContentSink + ?Sized>(&self, id: NodeId, sink: &mut S) {
        // Declarations first, in run order, mirroring the SAX contract.
        let mut prefixes: Vec<&str> = Vec::new();
        let mut ns = self.first_namespace_node(id);
        while let Some(node) = ns {
            let prefix = self.local_name(node);
            sink.start_prefix_mapping(prefix, self.node_value(node).unwrap_or(""));
            prefixes.push(prefix);
            ns = self.next_namespace_node(node);
        }

        let mut attrs: Vec<Attr<'_>> = Vec::new();
        let mut attr = self.first_attribute(id);
        while let Some(node) = attr {
            attrs.push(Attr {
                uri: self.namespace_uri(node),
                local: self.local_name(node),
                qname: self.node_name(node),
                value: self.node_value(node).unwrap_or(""),
                is_id: false,
            });
            attr = self.next_attribute(node);
        }

        let uri = self.namespace_uri(id);
        let local = self.local_name(id);
        let qname = self.node_name(id);
        sink.start_element(uri, local, qname, &attrs);

        let mut child = self.first_child_of(id);
        while let Some(node) = child {
            self.replay_node(node, sink);
            child = self.next_sibling_of(node);
        }

        sink.end_element(uri, local, qname);
        for prefix in prefixes.iter().rev() {
            sink.end_prefix_mapping(prefix);
        }
    }
}
