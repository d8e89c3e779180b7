//! Tree construction
//!
//! - `events`: the SAX-shaped inbound vocabulary ([`ContentSink`]) and
//!   its owned [`Event`] mirror
//! - `builder`: the event consumer appending to the columnar store
//! - `pump`: pull-driven on-demand construction
//! - `scratch`: multi-document store with checkpoint rollback

pub mod builder;
pub mod events;
pub mod pump;
pub mod scratch;

pub use builder::{BuildConfig, TreeBuilder, XML_NAMESPACE_URI};
pub use events::{play_all, Attr, ContentSink, Event, OwnedAttr};
pub use pump::{EventSource, IncrementalTree, SourceStatus, VecSource};
pub use scratch::ScratchTreeBuilder;
