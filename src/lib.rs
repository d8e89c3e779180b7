//! doctable - streaming columnar XML document table
//!
//! A SAX-shaped event stream goes in; an append-only, array-backed
//! document tree comes out, queried through dense node identities:
//!
//! - [`build::TreeBuilder`] consumes construction events into the
//!   columnar store
//! - [`store::DocTable`] answers point queries (kind, names, values,
//!   links, string-value, attribute runs, get-element-by-id)
//! - [`axis::AxisIter`] walks the standard document-order axes with
//!   optional type filters
//! - [`store::CompactView`] is the block-cached fast accessor over a
//!   sealed table
//! - [`build::IncrementalTree`] builds on demand, pulling events from
//!   an [`build::EventSource`] when a query runs past the built range
//! - [`build::ScratchTreeBuilder`] appends multiple documents and
//!   rolls the newest back to a checkpoint
//! - [`handle::TreeRegistry`] translates identities to external node
//!   handles and back

#![warn(missing_docs)]

pub mod axis;
pub mod build;
pub mod error;
pub mod handle;
mod replay;
pub mod store;

pub use axis::{Axis, AxisIter, TypeFilter};
pub use build::{
    play_all, Attr, BuildConfig, ContentSink, Event, EventSource, IncrementalTree, OwnedAttr,
    ScratchTreeBuilder, SourceStatus, TreeBuilder, VecSource, XML_NAMESPACE_URI,
};
pub use error::TreeError;
pub use handle::{NodeHandle, TreeRegistry, TreeTag};
pub use store::table::CharacterSink;
pub use store::{
    CompactView, DocTable, ExpandedNameTable, NodeId, NodeKind, SourceLocation, StringPool,
    TreeAccess, VIRTUAL_ROOT,
};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
