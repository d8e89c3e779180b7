//! String interning and expanded-name resolution
//!
//! Two tables back every name read in the store:
//! - `StringPool`: deduplicating intern pool for URIs, local names,
//!   prefixes, qualified names, and attribute/comment/PI values.
//!   Uses hash-based lookup to avoid storing duplicate string data.
//! - `ExpandedNameTable`: maps (namespace URI, local name, node kind)
//!   triples to small dense ids, and back. It is the canonical source
//!   of truth for a node's raw kind; the per-node columns carry only
//!   the expanded-type id.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use super::{NodeKind, KIND_COUNT};

/// String interning pool with deduplication.
///
/// Memory layout:
/// - `data`: one buffer holding every distinct string back to back
/// - `entries`: (offset, len) into `data` for each string id
/// - `hash_index`: hash -> list of ids (handles rare collisions)
///
/// Id 0 is reserved for the empty string.
#[derive(Debug)]
pub struct StringPool {
    data: String,
    entries: Vec<(u32, u32)>,
    hash_index: HashMap<u64, Vec<u32>>,
}

impl StringPool {
    /// Create a new pool with the empty string pre-entered as id 0.
    pub fn new() -> Self {
        StringPool {
            data: String::with_capacity(4096),
            entries: vec![(0, 0)],
            hash_index: HashMap::new(),
        }
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning its id. Repeated content returns the
    /// same id.
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }

        let hash = Self::compute_hash(s);
        if let Some(ids) = self.hash_index.get(&hash) {
            for &id in ids {
                if self.get(id) == s {
                    return id;
                }
            }
        }

        let offset = self.data.len() as u32;
        self.data.push_str(s);
        let id = self.entries.len() as u32;
        self.entries.push((offset, s.len() as u32));
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Look up the id of a string without interning it.
    pub fn find(&self, s: &str) -> Option<u32> {
        if s.is_empty() {
            return Some(0);
        }
        let ids = self.hash_index.get(&Self::compute_hash(s))?;
        ids.iter().copied().find(|&id| self.get(id) == s)
    }

    /// Resolve an id back to its string. Unknown ids resolve to "".
    #[inline]
    pub fn get(&self, id: u32) -> &str {
        match self.entries.get(id as usize) {
            Some(&(offset, len)) => {
                let start = offset as usize;
                &self.data[start..start + len as usize]
            }
            None => "",
        }
    }

    /// Number of distinct strings, counting the reserved empty entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when only the reserved empty entry exists.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Total bytes of stored string data.
    pub fn bytes_used(&self) -> usize {
        self.data.len()
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

/// One resolved expanded name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEntry {
    /// Namespace URI string id (0 for none).
    pub uri: u32,
    /// Local name string id (0 for unnamed kinds).
    pub local: u32,
    /// Raw node kind.
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NameKey {
    uri: u32,
    local: u32,
    kind: u32,
}

/// Maps (namespace URI, local name, kind) triples to dense expanded-type
/// ids.
///
/// Ids `0..KIND_COUNT` are built-ins, one per raw kind with no name, so
/// text/comment/document nodes collapse to their kind constant. Named
/// kinds (elements, attributes, PIs, namespace nodes) are assigned
/// lazily on first sight.
#[derive(Debug)]
pub struct ExpandedNameTable {
    entries: Vec<NameEntry>,
    lookup: HashMap<NameKey, u32>,
}

impl ExpandedNameTable {
    /// Create a table pre-populated with the built-in kind-only ids.
    pub fn new() -> Self {
        let mut table = ExpandedNameTable {
            entries: Vec::with_capacity(64),
            lookup: HashMap::new(),
        };
        for raw in 0..KIND_COUNT as u32 {
            let kind = NodeKind::from_raw(raw).unwrap();
            table.entries.push(NameEntry {
                uri: 0,
                local: 0,
                kind,
            });
            table.lookup.insert(
                NameKey {
                    uri: 0,
                    local: 0,
                    kind: raw,
                },
                raw,
            );
        }
        table
    }

    /// Id for the triple, assigning a fresh one on first sight.
    pub fn assign(&mut self, uri: u32, local: u32, kind: NodeKind) -> u32 {
        let key = NameKey {
            uri,
            local,
            kind: kind.raw(),
        };
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = self.entries.len() as u32;
        self.entries.push(NameEntry { uri, local, kind });
        self.lookup.insert(key, id);
        id
    }

    /// Id for the triple if it has been assigned already.
    pub fn find(&self, uri: u32, local: u32, kind: NodeKind) -> Option<u32> {
        self.lookup
            .get(&NameKey {
                uri,
                local,
                kind: kind.raw(),
            })
            .copied()
    }

    /// The entry behind an expanded-type id.
    #[inline]
    pub fn entry(&self, exp: u32) -> Option<&NameEntry> {
        self.entries.get(exp as usize)
    }

    /// Raw kind component of an expanded-type id.
    #[inline]
    pub fn kind_of(&self, exp: u32) -> Option<NodeKind> {
        self.entry(exp).map(|e| e.kind)
    }

    /// Number of assigned ids, built-ins included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the built-ins are present from construction.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ExpandedNameTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates() {
        let mut pool = StringPool::new();
        let a = pool.intern("chapter");
        let b = pool.intern("chapter");
        assert_eq!(a, b);
        assert_eq!(pool.get(a), "chapter");
    }

    #[test]
    fn intern_distinct() {
        let mut pool = StringPool::new();
        let a = pool.intern("title");
        let b = pool.intern("body");
        assert_ne!(a, b);
        assert_eq!(pool.get(b), "body");
    }

    #[test]
    fn empty_string_is_zero() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(""), 0);
        assert_eq!(pool.get(0), "");
        assert!(pool.is_empty());
    }

    #[test]
    fn find_without_interning() {
        let mut pool = StringPool::new();
        assert_eq!(pool.find("missing"), None);
        let id = pool.intern("present");
        assert_eq!(pool.find("present"), Some(id));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn builtin_ids_match_kinds() {
        let table = ExpandedNameTable::new();
        assert_eq!(table.kind_of(NodeKind::Text.raw()), Some(NodeKind::Text));
        assert_eq!(
            table.kind_of(NodeKind::Document.raw()),
            Some(NodeKind::Document)
        );
        assert_eq!(table.kind_of(KIND_COUNT as u32), None);
    }

    #[test]
    fn assign_is_stable() {
        let mut pool = StringPool::new();
        let mut table = ExpandedNameTable::new();
        let uri = pool.intern("http://example.com/ns");
        let local = pool.intern("item");
        let a = table.assign(uri, local, NodeKind::Element);
        let b = table.assign(uri, local, NodeKind::Element);
        assert_eq!(a, b);
        assert!(a >= KIND_COUNT as u32);

        // Same name, different kind gets a different id.
        let c = table.assign(uri, local, NodeKind::Attribute);
        assert_ne!(a, c);
        assert_eq!(table.entry(c).unwrap().kind, NodeKind::Attribute);
        assert_eq!(table.find(uri, local, NodeKind::Element), Some(a));
    }

    #[test]
    fn unnamed_assign_collapses_to_builtin() {
        let mut table = ExpandedNameTable::new();
        let id = table.assign(0, 0, NodeKind::Comment);
        assert_eq!(id, NodeKind::Comment.raw());
    }
}
