//! Error taxonomy
//!
//! Only three situations surface as values: the event source failing
//! mid-pump, the handle space running out, and invalid configuration at
//! setup time. Query-time absence always returns `None`/empty
//! sentinels, and internal-consistency violations (parallel-column or
//! location-record drift) abort via assertions because they mean a
//! builder invariant was broken.

use thiserror::Error;

/// Errors surfaced by the build, pump, and handle layers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeError {
    /// The incremental event source reported a failure instead of
    /// delivering events or exhaustion. Propagated to the caller of the
    /// query that triggered the pump; never retried.
    #[error("event source failure: {0}")]
    Source(String),

    /// The node-handle addressing space cannot cover another identity
    /// block.
    #[error("node handle space exhausted ({blocks} blocks in use)")]
    Capacity {
        /// Identity blocks already allocated.
        blocks: usize,
    },

    /// An invalid configuration was requested, fatal at setup time.
    #[error("configuration error: {0}")]
    Config(&'static str),
}
