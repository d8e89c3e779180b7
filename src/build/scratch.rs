//! Multi-document store with checkpoint rollback
//!
//! Appends whole documents into one store and discards the most recent
//! one(s) by truncating every growable structure back to a recorded
//! checkpoint. Used for scratch/temporary result construction where a
//! consumer builds a fragment, reads it, and throws it away.
//!
//! Checkpoints nest: push before appending a document, pop to discard
//! everything appended since the matching push.

use tracing::debug;

use super::builder::{BuildConfig, TreeBuilder};
use super::events::{Attr, ContentSink};
use crate::store::table::{Checkpoint, DocTable};
use crate::store::NodeId;
use crate::TreeError;

/// Builder over a store that accepts several documents and supports
/// tail-pruning back to checkpoints.
///
/// Element-type indexing stays rejected here: index entries cannot be
/// unwound on rollback, so the combination is refused at setup.
pub struct ScratchTreeBuilder {
    builder: TreeBuilder,
    marks: Vec<Checkpoint>,
}

impl ScratchTreeBuilder {
    /// Multi-document builder with default options.
    pub fn new() -> Result<Self, TreeError> {
        Self::with_config(BuildConfig::default())
    }

    /// Multi-document builder with explicit options; `multi_document`
    /// is forced on.
    pub fn with_config(config: BuildConfig) -> Result<Self, TreeError> {
        let config = BuildConfig {
            multi_document: true,
            ..config
        };
        Ok(ScratchTreeBuilder {
            builder: TreeBuilder::with_config(config)?,
            marks: Vec::new(),
        })
    }

    /// The store built so far, for querying between documents.
    pub fn table(&self) -> &DocTable {
        self.builder.table()
    }

    /// The builder, for feeding the next document's events.
    pub fn builder_mut(&mut self) -> &mut TreeBuilder {
        &mut self.builder
    }

    /// Document node of the most recently appended tree; the virtual
    /// root start accepted by axis iterators resolves here.
    pub fn current_document(&self) -> NodeId {
        self.builder.table().current_document()
    }

    /// Record the sizes of every growable structure. Refused while a
    /// document is mid-construction.
    pub fn push_checkpoint(&mut self) -> Result<(), TreeError> {
        if self.builder.is_open() {
            return Err(TreeError::Config(
                "checkpoint while a document is mid-construction",
            ));
        }
        let mark = self.builder.table().record_checkpoint();
        debug!(nodes = mark.count, depth = self.marks.len() + 1, "push checkpoint");
        self.marks.push(mark);
        Ok(())
    }

    /// Truncate every growable structure back to the most recent
    /// checkpoint, discarding all nodes, auxiliary data, and text
    /// appended since. Returns whether the store is now completely
    /// empty. Refused mid-document or with no checkpoint pushed.
    pub fn pop_checkpoint(&mut self) -> Result<bool, TreeError> {
        if self.builder.is_open() {
            return Err(TreeError::Config(
                "rollback while a document is mid-construction",
            ));
        }
        let Some(mark) = self.marks.pop() else {
            return Err(TreeError::Config("rollback without a checkpoint"));
        };
        let empty = self.builder.table_mut().rollback_to(&mark);
        debug!(nodes = mark.count, empty, "pop checkpoint");
        Ok(empty)
    }

    /// Nesting depth of pushed checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.marks.len()
    }
}

impl ContentSink for ScratchTreeBuilder {
    fn start_document(&mut self) {
        self.builder.start_document();
    }

    fn end_document(&mut self) {
        self.builder.end_document();
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.builder.start_prefix_mapping(prefix, uri);
    }

    fn end_prefix_mapping(&mut self, prefix: &str) {
        self.builder.end_prefix_mapping(prefix);
    }

    fn start_element(&mut self, uri: &str, local: &str, qname: &str, attrs: &[Attr<'_>]) {
        self.builder.start_element(uri, local, qname, attrs);
    }

    fn end_element(&mut self, uri: &str, local: &str, qname: &str) {
        self.builder.end_element(uri, local, qname);
    }

    fn characters(&mut self, text: &str) {
        self.builder.characters(text);
    }

    fn comment(&mut self, text: &str) {
        self.builder.comment(text);
    }

    fn processing_instruction(&mut self, target: &str, data: &str) {
        self.builder.processing_instruction(target, data);
    }

    fn start_cdata(&mut self) {
        self.builder.start_cdata();
    }

    fn end_cdata(&mut self) {
        self.builder.end_cdata();
    }

    fn start_dtd(&mut self, name: &str, public_id: Option<&str>, system_id: Option<&str>) {
        self.builder.start_dtd(name, public_id, system_id);
    }

    fn end_dtd(&mut self) {
        self.builder.end_dtd();
    }
}
