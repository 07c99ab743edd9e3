//! The constraint algebra (spec.md §4.3): a closed set of constraint
//! variants, each with a per-variant propagation rule dispatched by the
//! solver. Modeled as a tagged enum rather than an open trait hierarchy
//! per the design note in spec.md §9 ("Polymorphic constraint dispatch").

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flatten::Ty;
use crate::ids::NodeId;
use crate::ir::MethodId;

/// Offsets are signed so that stack-relative and negative-normalized
/// offsets (encountered by field/element addressing on already-offset
/// nodes) are representable; a concrete node id is always non-negative.
pub type Offset = i64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// `dst ∋ obj` — one-time fact, inserts `obj` into `pts(dst)`.
    Addr { dst: NodeId, obj: NodeId },
    /// `pts(dst) ⊇ pts(src)`.
    Copy { dst: NodeId, src: NodeId },
    /// `pts(dst) ⊇ pts(*p + offset)` for `p ∈ pts(src)`.
    Load {
        offset: Offset,
        dst: NodeId,
        src: NodeId,
    },
    /// `pts(*p + offset) ⊇ pts(src)` for `p ∈ pts(dst)`.
    Store {
        offset: Offset,
        dst: NodeId,
        src: NodeId,
    },
    /// `pts(dst) ⊇ {o + offset | o ∈ pts(src)}`.
    OffsetAddr {
        offset: Offset,
        dst: NodeId,
        src: NodeId,
    },
    /// Filters by dynamic type subsumption against `asserted_ty`.
    TypeAssert {
        asserted_ty: Ty,
        dst: NodeId,
        src: NodeId,
        extracts_payload: bool,
    },
    /// Resolves a dynamic method call through an interface's tagged label.
    Invoke {
        method_name: String,
        iface: NodeId,
        block: InvokeBlock,
    },
    /// A dynamic (closure) call: `block`'s P/R window is wired directly
    /// against whichever function objects `closure` points to, with no
    /// method-name lookup (spec.md §4.4 "dynamic (closure) call").
    DynCall { closure: NodeId, block: InvokeBlock },
    /// A reflection-intrinsic constraint; payload and `solve` semantics
    /// live in `crate::intrinsics`.
    Intrinsic(IntrinsicConstraint),
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Addr { dst, obj } => write!(f, "{dst} = &{obj}"),
            Constraint::Copy { dst, src } => write!(f, "{dst} = {src}"),
            Constraint::Load { offset, dst, src } => write!(f, "{dst} = *({src} + {offset})"),
            Constraint::Store { offset, dst, src } => write!(f, "*({dst} + {offset}) = {src}"),
            Constraint::OffsetAddr { offset, dst, src } => write!(f, "{dst} = {src} + {offset}"),
            Constraint::TypeAssert { asserted_ty, dst, src, .. } => {
                write!(f, "{dst} = {src}.({asserted_ty:?})")
            }
            Constraint::Invoke { method_name, iface, .. } => {
                write!(f, "invoke {iface}.{method_name}(..)")
            }
            Constraint::DynCall { closure, .. } => write!(f, "call *{closure}(..)"),
            Constraint::Intrinsic(ic) => write!(f, "{ic:?}"),
        }
    }
}

/// The parameter/result window a call instruction's constraints copy into
/// and out of: `invoke` and closure-call generation both produce one of
/// these and emit copies against it once the callee contour is known.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvokeBlock {
    pub args: Vec<NodeId>,
    pub result: Option<NodeId>,
    /// The node whose points-to set names every callable reached through
    /// this call site (spec.md §3 "Call site").
    pub targets: NodeId,
    pub call_pos: crate::ir::SourcePosition,
    /// Back-reference to the `CallSite` this block belongs to, so the
    /// solver can record the resolved call-graph edge.
    pub call_site: crate::generator::CallSiteId,
}

/// Reflection-intrinsic constraint payloads (spec.md §4.4 "Reflection
/// handling"). Each carries exactly the nodes its `solve` needs; the
/// dispatch itself lives in `crate::intrinsics::solve_intrinsic`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntrinsicConstraint {
    /// `TypeOf(i) -> Type`: for each label of `i`, emit the canonical
    /// `*rtype`-tagged object for its dynamic type.
    TypeOf { src: NodeId, dst: NodeId },
    /// `ChanOf(dir, t) -> Type`.
    ChanOf {
        dir: Option<crate::ir::ChanDir>,
        elem_ty: Ty,
        dst: NodeId,
    },
    /// `(reflect.Type).Elem() -> Type`: the element/pointee type of a
    /// pointer, slice, array, chan, or map `reflect.Type`. Like `ChanOf`,
    /// the element type is supplied as a call-site const-arg rather than
    /// derived from the receiver's dynamic label, because this crate's `Ty`
    /// does not structurally carry a pointer's pointee type the way the
    /// analyzed language's real type system does (see DESIGN.md).
    Elem { elem_ty: Ty, dst: NodeId },
    /// `MakeChan(t)` / `MakeMap(t)` / `New(t)`: allocate a fresh object of
    /// element type(s) and wrap its address in a tagged object.
    Allocating {
        kind: AllocatingIntrinsic,
        elem_ty: Ty,
        dst: NodeId,
        call_site: crate::ir::SourcePosition,
    },
    /// `Zero(t)`: the canonical zero value tagged object for `t`.
    Zero { ty: Ty, dst: NodeId, call_site: crate::ir::SourcePosition },
    /// `(Value).MapIndex`, `MapKeys`, `Recv`, `Send`, `SetMapIndex`,
    /// `Interface`: use the dynamic-type tag to extract the container's
    /// element/key type and emit a load/store of the tagged payload.
    ContainerAccess {
        op: ContainerOp,
        container: NodeId,
        dst: Option<NodeId>,
        src: Option<NodeId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AllocatingIntrinsic {
    MakeChan,
    MakeMap,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContainerOp {
    MapIndex,
    MapKeys,
    Recv,
    Send,
    SetMapIndex,
    Interface,
}

/// An ordered, deduplicated bag of constraints. A thin `BTreeSet` wrapper
/// matching the teacher's `ConstraintSet` (`constraint_generation/mod.rs`:
/// `singleton`, `union`, `insert_all`, `From<BTreeSet<..>>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet(BTreeSet<Constraint>);

impl ConstraintSet {
    pub fn empty() -> ConstraintSet {
        ConstraintSet::default()
    }

    pub fn singleton(c: Constraint) -> ConstraintSet {
        let mut s = BTreeSet::new();
        s.insert(c);
        ConstraintSet(s)
    }

    pub fn insert(&mut self, c: Constraint) -> bool {
        self.0.insert(c)
    }

    pub fn insert_all(&mut self, other: &ConstraintSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn union(&self, other: &ConstraintSet) -> ConstraintSet {
        ConstraintSet(self.0.union(&other.0).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeSet<Constraint>> for ConstraintSet {
    fn from(s: BTreeSet<Constraint>) -> Self {
        ConstraintSet(s)
    }
}

impl FromIterator<Constraint> for ConstraintSet {
    fn from_iter<T: IntoIterator<Item = Constraint>>(iter: T) -> Self {
        ConstraintSet(iter.into_iter().collect())
    }
}

impl IntoIterator for ConstraintSet {
    type Item = Constraint;
    type IntoIter = std::collections::btree_set::IntoIter<Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A resolved method reference, used by `invoke` resolution once a dynamic
/// type is known (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    pub method: MethodId,
    pub callee: crate::ir::FunctionId,
}
