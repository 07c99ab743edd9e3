//! Built-in function handling (spec.md §4.4 "Built-in rules"): `append`,
//! `copy`, `panic`/`recover`, `print`/`println`, and the no-effect group
//! (`len`, `cap`, `real`, `imag`, `complex`, `close`, `delete`).

use std::collections::HashMap;

use crate::constraints::Constraint;
use crate::flatten::Ty;
use crate::ids::{AllocSite, ObjectFlags};
use crate::ir::{SourcePosition, ValueId};

use super::{CgNodeId, Generator};

/// `append(slice, elem...)`: the result aliases the input slice (it may be
/// the same backing array, grown in place) and, when an element argument is
/// present, a fresh backing array is also modeled and folded in — the
/// solver cannot tell which branch the runtime takes, so both are named.
pub(super) fn gen_append(
    gen: &mut Generator,
    cgn: CgNodeId,
    dst: ValueId,
    slice: ValueId,
    elem: Option<ValueId>,
    elem_ty: &Ty,
    pos: &SourcePosition,
    local: &mut HashMap<ValueId, crate::ids::NodeId>,
    func_name: &str,
) {
    let dst_n = gen.value_node(local, dst);
    let slice_n = gen.value_node(local, slice);
    gen.emit(Constraint::Copy { dst: dst_n, src: slice_n });

    if let Some(elem) = elem {
        let elem_n = gen.value_node(local, elem);
        let head = gen.nodes_mut().add_many(elem_ty, format!("{func_name}:append-backing"));
        let obj = gen.nodes_mut().end_object(
            head,
            Some(cgn),
            AllocSite {
                description: format!("append@{pos}"),
                function: func_name.to_owned(),
            },
            ObjectFlags::empty(),
        );
        gen.emit(Constraint::Addr { dst: dst_n, obj: obj.0 });
        gen.emit_stepped_store(elem_ty, 0, dst_n, elem_n);
    }
}

/// `copy(dst, src)`: reads the full width of the element type out of
/// `src`'s backing array through a temporary, then writes that temporary
/// into `dst`'s backing array — `dst` and `src` themselves are never
/// aliased, only the content they point at.
pub(super) fn gen_copy(
    gen: &mut Generator,
    dst: ValueId,
    src: ValueId,
    elem_ty: &Ty,
    local: &HashMap<ValueId, crate::ids::NodeId>,
    func_name: &str,
) {
    let dst_n = gen.value_node(local, dst);
    let src_n = gen.value_node(local, src);
    for (i, field) in crate::flatten::flatten(elem_ty).into_iter().enumerate() {
        let tmp = gen
            .nodes_mut()
            .add_one(field.ty, format!("{func_name}:copy-tmp"), None);
        gen.emit(Constraint::Load {
            offset: i as i64,
            dst: tmp,
            src: src_n,
        });
        gen.emit(Constraint::Store {
            offset: i as i64,
            dst: dst_n,
            src: tmp,
        });
    }
}

/// `print`/`println`: no effect on points-to beyond merging the first
/// argument into a canonical per-call-site probe node, so a client print
/// hook can query it after the fact; the probe is created (and the hook
/// fired) exactly once per source position regardless of contour
/// multiplicity (spec.md §4.4, §4.6).
pub(super) fn gen_print(
    gen: &mut Generator,
    args: &[ValueId],
    pos: &SourcePosition,
    local: &HashMap<ValueId, crate::ids::NodeId>,
) {
    let probe = gen.probe_for(pos);
    if let Some(first) = args.first() {
        let arg_n = gen.value_node(local, *first);
        gen.emit(Constraint::Copy { dst: probe, src: arg_n });
    }
}
