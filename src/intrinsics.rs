//! The reflection intrinsic library (spec.md §4.4 "Reflection handling"):
//! a process-wide, read-only table mapping a fully qualified standard
//! library name to the shape of the constraint that call recognizes. The
//! table itself is static (grounded in the teacher's process-wide
//! `lazy_static!` tables, e.g. `constraint_generation/type_inference.rs`);
//! generation here only classifies the call and emits one `Intrinsic`
//! constraint — the solver (`crate::solver`) does the actual work once
//! operand points-to sets are known.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;

use crate::constraints::{AllocatingIntrinsic, Constraint, ContainerOp, IntrinsicConstraint};
use crate::error::AnalysisError;
use crate::flatten::Ty;
use crate::generator::{CgNodeId, Generator};
use crate::ids::NodeId;
use crate::ir::{ChanDir, ConstArg, SourcePosition, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    TypeOf,
    ChanOf,
    Elem,
    Alloc(AllocatingIntrinsic),
    Zero,
    Container(ContainerOp),
}

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, Kind> = {
        let mut m = HashMap::new();
        m.insert("reflect.TypeOf", Kind::TypeOf);
        m.insert("reflect.ChanOf", Kind::ChanOf);
        m.insert("(reflect.Type).Elem", Kind::Elem);
        m.insert("reflect.MakeChan", Kind::Alloc(AllocatingIntrinsic::MakeChan));
        m.insert("reflect.MakeMap", Kind::Alloc(AllocatingIntrinsic::MakeMap));
        m.insert("reflect.New", Kind::Alloc(AllocatingIntrinsic::New));
        m.insert("reflect.Zero", Kind::Zero);
        m.insert("(reflect.Value).MapIndex", Kind::Container(ContainerOp::MapIndex));
        m.insert("(reflect.Value).MapKeys", Kind::Container(ContainerOp::MapKeys));
        m.insert("(reflect.Value).Recv", Kind::Container(ContainerOp::Recv));
        m.insert("(reflect.Value).Send", Kind::Container(ContainerOp::Send));
        m.insert("(reflect.Value).SetMapIndex", Kind::Container(ContainerOp::SetMapIndex));
        m.insert("(reflect.Value).Interface", Kind::Container(ContainerOp::Interface));
        m
    };
}

/// True if `name` names a recognized reflection intrinsic; front-ends use
/// this to decide whether a call lowers to `Instr::IntrinsicCall` or an
/// ordinary `StaticCall`/`Invoke`.
pub fn is_intrinsic(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn generate(
    gen: &mut Generator,
    cgn: CgNodeId,
    dst: Option<ValueId>,
    qualified_name: &str,
    args: &[ValueId],
    const_args: &BTreeMap<usize, ConstArg>,
    pos: &SourcePosition,
    local: &mut HashMap<ValueId, NodeId>,
) -> Result<(), AnalysisError> {
    let kind = *REGISTRY
        .get(qualified_name)
        .ok_or_else(|| AnalysisError::UnsupportedForm {
            detail: format!("unrecognized intrinsic `{qualified_name}`"),
        })?;

    let node_of = |gen: &Generator, local: &HashMap<ValueId, NodeId>, v: ValueId| gen.value_node(local, v);
    let dst_node = dst.map(|d| node_of(gen, local, d));

    match kind {
        Kind::TypeOf => {
            let dst = dst_node.ok_or_else(|| {
                AnalysisError::invariant("reflect.TypeOf discarded its result")
            })?;
            let src = node_of(gen, local, args[0]);
            gen.emit(Constraint::Intrinsic(IntrinsicConstraint::TypeOf { src, dst }));
        }
        Kind::ChanOf => {
            let dst = dst_node.ok_or_else(|| {
                AnalysisError::invariant("reflect.ChanOf discarded its result")
            })?;
            let dir = match const_args.get(&0) {
                Some(ConstArg::ChanDir(d)) => Some(*d),
                _ => None::<ChanDir>,
            };
            let elem_ty = match const_args.get(&1) {
                Some(ConstArg::Type(t)) => t.clone(),
                _ => Ty::Invalid,
            };
            gen.emit(Constraint::Intrinsic(IntrinsicConstraint::ChanOf { dir, elem_ty, dst }));
        }
        Kind::Elem => {
            let dst = dst_node.ok_or_else(|| {
                AnalysisError::invariant("(reflect.Type).Elem discarded its result")
            })?;
            let elem_ty = match const_args.get(&0) {
                Some(ConstArg::Type(t)) => t.clone(),
                _ => Ty::Invalid,
            };
            gen.emit(Constraint::Intrinsic(IntrinsicConstraint::Elem { elem_ty, dst }));
        }
        Kind::Alloc(which) => {
            let dst = dst_node.ok_or_else(|| {
                AnalysisError::invariant("reflect allocating intrinsic discarded its result")
            })?;
            let elem_ty = match const_args.get(&0) {
                Some(ConstArg::Type(t)) => t.clone(),
                _ => Ty::Invalid,
            };
            gen.emit(Constraint::Intrinsic(IntrinsicConstraint::Allocating {
                kind: which,
                elem_ty,
                dst,
                call_site: pos.clone(),
            }));
        }
        Kind::Zero => {
            let dst = dst_node.ok_or_else(|| AnalysisError::invariant("reflect.Zero discarded its result"))?;
            let ty = match const_args.get(&0) {
                Some(ConstArg::Type(t)) => t.clone(),
                _ => Ty::Invalid,
            };
            gen.emit(Constraint::Intrinsic(IntrinsicConstraint::Zero {
                ty,
                dst,
                call_site: pos.clone(),
            }));
        }
        Kind::Container(op) => {
            let container = node_of(gen, local, args[0]);
            let (dst, src) = match op {
                ContainerOp::MapIndex | ContainerOp::MapKeys | ContainerOp::Recv | ContainerOp::Interface => {
                    (dst_node, None)
                }
                ContainerOp::Send => (None, args.get(1).map(|a| node_of(gen, local, *a))),
                ContainerOp::SetMapIndex => (None, args.get(2).map(|a| node_of(gen, local, *a))),
            };
            gen.emit(Constraint::Intrinsic(IntrinsicConstraint::ContainerAccess {
                op,
                container,
                dst,
                src,
            }));
        }
    }
    let _ = cgn;
    Ok(())
}
