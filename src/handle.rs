//! Node handles: identity plus tree membership
//!
//! A handle packs a within-block identity into the low bits and a
//! global block number into the high bits. The registry maps global
//! blocks to (tree, ordinal) pairs, so a tree that outgrows one block
//! claims further blocks on demand; translation stays bijective for the
//! life of the registry. Running out of blocks is the one capacity
//! error in the crate.

use tracing::debug;

use crate::error::TreeError;
use crate::store::NodeId;

/// Identity bits per block.
pub const IDENTITY_BITS: u32 = 16;

/// Identities addressable within one block.
pub const BLOCK_IDENTITIES: u32 = 1 << IDENTITY_BITS;

const IDENTITY_MASK: u32 = BLOCK_IDENTITIES - 1;

/// Total global blocks the 32-bit handle space can address.
pub const MAX_BLOCKS: usize = 1 << (32 - IDENTITY_BITS);

/// Opaque external node reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

impl NodeHandle {
    /// The packed representation.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild a handle from its packed representation.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        NodeHandle(raw)
    }
}

/// Registered tree index.
pub type TreeTag = usize;

/// Allocates handle blocks to trees and translates in both directions.
#[derive(Debug, Default)]
pub struct TreeRegistry {
    /// Global block -> (owning tree, ordinal within that tree).
    block_owner: Vec<(TreeTag, u32)>,
    /// Tree -> its global blocks in ordinal order.
    trees: Vec<Vec<u32>>,
}

impl TreeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        TreeRegistry::default()
    }

    fn alloc_block(&mut self, tree: TreeTag) -> Result<u32, TreeError> {
        if self.block_owner.len() >= MAX_BLOCKS {
            return Err(TreeError::Capacity {
                blocks: self.block_owner.len(),
            });
        }
        let block = self.block_owner.len() as u32;
        let ordinal = self.trees[tree].len() as u32;
        self.block_owner.push((tree, ordinal));
        self.trees[tree].push(block);
        if ordinal > 0 {
            debug!(tree, block, ordinal, "extended tree with another identity block");
        }
        Ok(block)
    }

    /// Register a tree, allocating its first identity block.
    pub fn register(&mut self) -> Result<TreeTag, TreeError> {
        let tag = self.trees.len();
        self.trees.push(Vec::with_capacity(1));
        match self.alloc_block(tag) {
            Ok(_) => Ok(tag),
            Err(err) => {
                self.trees.pop();
                Err(err)
            }
        }
    }

    /// Handle for (tree, identity), claiming extension blocks as the
    /// identity range grows. This is the capacity escape valve: the
    /// error is returned only when the whole handle space is spent.
    pub fn handle_for(&mut self, tree: TreeTag, identity: NodeId) -> Result<NodeHandle, TreeError> {
        let ordinal = (identity >> IDENTITY_BITS) as usize;
        while ordinal >= self.trees[tree].len() {
            self.alloc_block(tree)?;
        }
        let block = self.trees[tree][ordinal];
        Ok(NodeHandle((block << IDENTITY_BITS) | (identity & IDENTITY_MASK)))
    }

    /// Handle for (tree, identity) without extending; `None` when the
    /// identity lies past the tree's allocated blocks.
    pub fn lookup_handle(&self, tree: TreeTag, identity: NodeId) -> Option<NodeHandle> {
        let ordinal = (identity >> IDENTITY_BITS) as usize;
        let block = *self.trees.get(tree)?.get(ordinal)?;
        Some(NodeHandle((block << IDENTITY_BITS) | (identity & IDENTITY_MASK)))
    }

    /// Invert a handle to (tree, identity).
    pub fn resolve(&self, handle: NodeHandle) -> Option<(TreeTag, NodeId)> {
        let block = (handle.raw() >> IDENTITY_BITS) as usize;
        let (tree, ordinal) = *self.block_owner.get(block)?;
        let identity = (ordinal << IDENTITY_BITS) | (handle.raw() & IDENTITY_MASK);
        Some((tree, identity))
    }

    /// Number of registered trees.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Global blocks handed out so far.
    pub fn blocks_in_use(&self) -> usize {
        self.block_owner.len()
    }
}
