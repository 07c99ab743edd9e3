//! The node universe: a dense, append-only table of per-scalar abstraction
//! nodes, plus the object headers that turn a contiguous run of nodes into
//! an allocation.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flatten::Ty;

/// Identifies a single scalar abstraction node. Dense, append-only, never
/// renumbered or freed. `NodeId::SENTINEL` is the initial "uninteresting"
/// node created at start-up: it is never a legitimate destination of `addr`
/// nor a legitimate source of a non-trivial `copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const SENTINEL: NodeId = NodeId(0);

    pub fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Node id after applying a field offset; used by `offsetAddr` and by
    /// collapsing `load`/`store` into per-field `copy` edges.
    pub fn offset(self, delta: usize) -> NodeId {
        NodeId(self.0 + delta as u32)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identifies an object (allocation). Numerically equal to its head node's
/// id; kept as a distinct type so "object" and "node" are not confused at
/// call sites, the way the teacher keeps `TypeId` distinct from `NodeIndex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub NodeId);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj@{}", self.0)
    }
}

bitflags::bitflags! {
    /// Flag bits carried by an object header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ObjectFlags: u8 {
        /// This object is a function contour (a call-graph node's identity block).
        const FUNCTION = 0b0001;
        /// This object is a tagged object (interface / reflect.Value payload carrier).
        const TAGGED   = 0b0010;
        /// A tagged object whose payload is stored indirectly (pointer to payload).
        const INDIRECT = 0b0100;
    }
}

/// Opaque, client-supplied data identifying an allocation site. Carried
/// through unchanged so the result API can build human-readable labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocSite {
    pub description: String,
    pub function: String,
}

/// The header living on the first node of an object's block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub size: usize,
    /// The call-graph node (contour) that allocated this object, if any.
    pub cgn: Option<crate::generator::CgNodeId>,
    pub data: AllocSite,
    pub flags: ObjectFlags,
    /// For a `map[K]V` backing object only: `sizeof(K)`, the offset at which
    /// the value half of the flattened `(K, V)` tuple begins. `None` for
    /// every other kind of object. Lets reflection's `MapIndex`/`MapKeys`/
    /// `SetMapIndex` intrinsics (solved only from a dynamic label, with no
    /// static `key_ty` in hand) find the value slot the same way ordinary
    /// `MapLookup`/`MapUpdate` generation does with a statically known type.
    pub key_size: Option<usize>,
}

/// A single entry in the node table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub ty: Ty,
    pub comment: String,
    /// Path describing which field of a composite this node abstracts,
    /// e.g. `.field[*]`, used for diagnostics and field-sensitivity.
    pub subelement: Option<String>,
    pub header: Option<ObjectHeader>,
}

/// The dense, append-only table of nodes. Nodes and objects are never
/// renumbered or freed once created (spec.md §3 "Lifecycles").
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NodeTable {
    nodes: Vec<NodeRecord>,
}

impl NodeTable {
    /// Creates a fresh table seeded with the sentinel node at id 0.
    pub fn new() -> NodeTable {
        let mut t = NodeTable { nodes: Vec::new() };
        let sentinel = t.add_one(Ty::Invalid, "sentinel".to_owned(), None);
        debug_assert_eq!(sentinel, NodeId::SENTINEL);
        t
    }

    pub fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        &mut self.nodes[id.index()]
    }

    /// Appends a single node, returning its id.
    pub fn add_one(&mut self, ty: Ty, comment: impl Into<String>, subelement: Option<String>) -> NodeId {
        let id = self.next_id();
        self.nodes.push(NodeRecord {
            id,
            ty,
            comment: comment.into(),
            subelement,
            header: None,
        });
        id
    }

    /// Appends `flatten(ty).len()` nodes for a (possibly composite) type and
    /// returns the id of the first one, or `NodeId::SENTINEL` if the type is
    /// analytically uninteresting (spec.md §4.1 invariant).
    pub fn add_many(&mut self, ty: &Ty, comment: impl Into<String>) -> NodeId {
        let comment = comment.into();
        let flat = crate::flatten::flatten(ty);
        if flat.is_empty() {
            return NodeId::SENTINEL;
        }
        let first = self.next_id();
        for (i, field) in flat.iter().enumerate() {
            self.add_one(field.ty.clone(), format!("{comment}{}", field.path), None);
            let _ = i;
        }
        first
    }

    /// Promotes the node block `[head_id, next_id())` into an object. Pads
    /// with one invalid node if the block would otherwise be empty, so
    /// every object occupies at least one slot.
    ///
    /// "Empty" is signaled two ways by callers: either `head_id` is the
    /// `next_id()` captured right before a (possibly zero-length) run of
    /// `add_one`/`add_many` calls, or `head_id` is `NodeId::SENTINEL` as
    /// returned directly by `add_many` for a type with no pointer-like
    /// content. Both must be padded here, never confused with a real
    /// object whose head happens to be node 0 — node 0 is permanently the
    /// table's sentinel and never legitimately starts an object.
    pub fn end_object(
        &mut self,
        head_id: NodeId,
        cgn: Option<crate::generator::CgNodeId>,
        data: AllocSite,
        flags: ObjectFlags,
    ) -> ObjectId {
        let head_id = if head_id.is_sentinel() || head_id == self.next_id() {
            self.add_one(Ty::Invalid, "padding", None)
        } else {
            head_id
        };
        let size = self.next_id().index() - head_id.index();
        self.get_mut(head_id).header = Some(ObjectHeader {
            size,
            cgn,
            data,
            flags,
            key_size: None,
        });
        ObjectId(head_id)
    }

    /// Returns the head node's header for the object starting at `head_id`,
    /// or `None` if `head_id` does not carry an object header.
    pub fn header_of(&self, id: ObjectId) -> Option<&ObjectHeader> {
        self.get(id.0).header.as_ref()
    }

    /// Records the key/value split point for a `map[K]V` backing object
    /// (spec.md §4.4 "map update"/"map lookup": value lives at `sizeof(K)`).
    pub fn set_key_size(&mut self, id: ObjectId, key_size: usize) {
        if let Some(h) = self.get_mut(id.0).header.as_mut() {
            h.key_size = Some(key_size);
        }
    }

    pub fn iter_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.header.is_some())
            .map(|n| ObjectId(n.id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter()
    }
}

/// Canonicalizes `*rtype`-style tagged objects so `TypeOf(T)` always
/// returns the same object for a given `T` (spec.md §4.4 "memoized where
/// safe").
#[derive(Debug, Default)]
pub struct TypeObjectCache {
    by_type: HashMap<Ty, ObjectId>,
}

impl TypeObjectCache {
    pub fn new() -> TypeObjectCache {
        TypeObjectCache::default()
    }

    pub fn get(&self, ty: &Ty) -> Option<ObjectId> {
        self.by_type.get(ty).copied()
    }

    pub fn insert(&mut self, ty: Ty, obj: ObjectId) {
        self.by_type.insert(ty, obj);
    }
}
