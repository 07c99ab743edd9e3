//! End-to-end scenarios exercising the whole generate-then-solve pipeline
//! against hand-built SSA programs, one per representative use case from
//! spec.md §8. Each test builds a tiny `Program` with `ProgramBuilder`, runs
//! `generator::generate` + `solver::solve` + `result::build`, and asserts on
//! the resulting points-to/call-graph answers.

use std::collections::BTreeMap;

use pointer_analysis::config::{Config, Hooks, QueryKey};
use pointer_analysis::flatten::{BasicKind, StructField, Ty};
use pointer_analysis::ir::{
    ConstArg, FunctionId, Instr, MethodId, Program, ProgramBuilder, SourcePosition, ValueId,
};
use pointer_analysis::{generator, result, solver};

fn pos(file: &str, line: u32) -> SourcePosition {
    SourcePosition { file: file.to_owned(), line }
}

fn ptr() -> Ty {
    Ty::Basic(BasicKind::Pointer)
}

fn run(prog: &Program, entry: &str, queries: BTreeMap<QueryKey, bool>) -> (result::AnalysisResult, solver::SolveResult) {
    let cfg = Config {
        entry_packages: vec![entry.to_owned()],
        queries,
    };
    let hooks = Hooks::none();
    let gen = generator::generate(prog, &cfg, &hooks).expect("generation succeeds");
    let solved = solver::solve(prog, gen, &hooks).expect("solving succeeds");
    let out = result::build(&solved, &cfg);
    (out, solved)
}

fn query(f: FunctionId, v: ValueId) -> QueryKey {
    QueryKey { function: f, value: v }
}

/// Scenario: interface dispatch. Two concrete types TA/TB each implement a
/// method `M`; only a TA-tagged value is ever boxed into an interface, so
/// `invoke` must resolve to `fnA`'s body and the result must point only at
/// `fnA`'s own allocation, never `fnB`'s (spec.md §4.5 "Invoke resolution").
#[test]
fn interface_dispatch_selects_the_boxed_types_method() {
    let mut b = ProgramBuilder::new();

    let ta = Ty::Struct(vec![StructField { name: "a".into(), ty: ptr() }]);
    let tb = Ty::Struct(vec![StructField { name: "b".into(), ty: ptr() }]);

    let fn_a = b.add_function("fnA", Ty::Invalid, vec![], vec![], vec![ptr()]);
    b.push_block(
        fn_a,
        vec![
            Instr::Alloc { dst: ValueId(0), ty: ptr(), pos: pos("fnA.go", 1) },
            Instr::Return { results: vec![ValueId(0)] },
        ],
    );

    let fn_b = b.add_function("fnB", Ty::Invalid, vec![], vec![], vec![ptr()]);
    b.push_block(
        fn_b,
        vec![
            Instr::Alloc { dst: ValueId(0), ty: ptr(), pos: pos("fnB.go", 1) },
            Instr::Return { results: vec![ValueId(0)] },
        ],
    );

    b.add_method(ta.clone(), "M", fn_a);
    b.add_method(tb, "M", fn_b);

    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);
    let receiver = ValueId(0);
    let iface = ValueId(1);
    let result_v = ValueId(2);
    b.push_block(
        main,
        vec![
            Instr::Alloc { dst: receiver, ty: ptr(), pos: pos("main.go", 1) },
            Instr::MakeInterface { dst: iface, src: receiver, dynamic_ty: ta.clone(), pos: pos("main.go", 2) },
            Instr::Invoke {
                dst: Some(result_v),
                result_ty: ptr(),
                iface,
                method: MethodId { receiver_type: ta, name: "M".into() },
                args: vec![],
                pos: pos("main.go", 3),
            },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, result_v), false);
    let (out, solved) = run(&prog, "main", queries);

    assert!(out.warnings.is_empty(), "unexpected warnings: {:?}", out.warnings);
    let answer = out.queries.get(&query(main, result_v)).unwrap();
    assert_eq!(answer.labels.len(), 1);
    assert!(answer.labels[0].path().contains("fnA.go"));

    for edge in &out.call_graph {
        let (_, callee) = result::describe_edge(&prog, &solved, edge);
        assert_ne!(callee, "fnB", "fnB should never be reached: TB is never boxed into an interface");
    }
}

/// Scenario: map update/lookup. A value stored under one key is read back
/// through the same map without aliasing the key's own allocation (spec.md
/// §4.4 built-in/map rules).
#[test]
fn map_update_then_lookup_recovers_the_stored_value_only() {
    let mut b = ProgramBuilder::new();
    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);

    let m = ValueId(0);
    let k = ValueId(1);
    let v = ValueId(2);
    let looked_up = ValueId(3);

    b.push_block(
        main,
        vec![
            Instr::MakeMap { dst: m, key_ty: ptr(), val_ty: ptr(), pos: pos("main.go", 1) },
            Instr::Alloc { dst: k, ty: ptr(), pos: pos("key.go", 1) },
            Instr::Alloc { dst: v, ty: ptr(), pos: pos("val.go", 1) },
            Instr::MapUpdate { map: m, key: k, value: v, key_ty: ptr(), val_ty: ptr() },
            Instr::MapLookup { dst: looked_up, map: m, key: k, key_ty: ptr(), val_ty: ptr() },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, looked_up), false);
    let (out, _solved) = run(&prog, "main", queries);

    let answer = out.queries.get(&query(main, looked_up)).unwrap();
    assert_eq!(answer.labels.len(), 1);
    assert!(answer.labels[0].path().contains("val.go"));
}

/// Scenario: reflection round trip. `TypeOf(a).Elem()` must converge on the
/// same canonical `*rtype` object that `TypeOf` would produce for the
/// element type directly (spec.md §8 "Reflection round-trip").
#[test]
fn typeof_then_elem_converges_with_direct_typeof_of_the_element_type() {
    let mut b = ProgramBuilder::new();
    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);

    let outer_ty = ptr();
    let elem_ty = Ty::Basic(BasicKind::Numeric);

    let a = ValueId(0);
    let rt = ValueId(1);
    let et = ValueId(2);
    let b_val = ValueId(3);
    let rt_elem_direct = ValueId(4);

    let mut elem_const_args = BTreeMap::new();
    elem_const_args.insert(0usize, ConstArg::Type(elem_ty.clone()));

    b.push_block(
        main,
        vec![
            Instr::Alloc { dst: a, ty: outer_ty, pos: pos("main.go", 1) },
            Instr::IntrinsicCall {
                dst: Some(rt),
                qualified_name: "reflect.TypeOf".into(),
                args: vec![a],
                const_args: BTreeMap::new(),
                pos: pos("main.go", 2),
            },
            Instr::IntrinsicCall {
                dst: Some(et),
                qualified_name: "(reflect.Type).Elem".into(),
                args: vec![rt],
                const_args: elem_const_args,
                pos: pos("main.go", 3),
            },
            Instr::Alloc { dst: b_val, ty: elem_ty.clone(), pos: pos("main.go", 4) },
            Instr::IntrinsicCall {
                dst: Some(rt_elem_direct),
                qualified_name: "reflect.TypeOf".into(),
                args: vec![b_val],
                const_args: BTreeMap::new(),
                pos: pos("main.go", 5),
            },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, et), false);
    queries.insert(query(main, rt_elem_direct), false);
    let (out, _solved) = run(&prog, "main", queries);

    let via_elem = out.queries.get(&query(main, et)).unwrap();
    let via_direct = out.queries.get(&query(main, rt_elem_direct)).unwrap();
    assert_eq!(via_elem.labels.len(), 1);
    assert_eq!(via_direct.labels.len(), 1);
    assert_eq!(
        via_elem.labels[0].object, via_direct.labels[0].object,
        "Elem()'s rtype object should be the same canonical object as TypeOf() on the element type directly"
    );
}

/// Scenario: append discipline. The appended element is reachable by
/// dereferencing the grown slice, but never through the original (empty)
/// backing array (spec.md §4.4 "append").
#[test]
fn append_stores_the_element_behind_the_new_backing_array_only() {
    let mut b = ProgramBuilder::new();
    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);

    let s = ValueId(0);
    let target = ValueId(1);
    let s2 = ValueId(2);
    let readback = ValueId(3);

    b.push_block(
        main,
        vec![
            Instr::MakeSlice { dst: s, elem_ty: ptr(), pos: pos("main.go", 1) },
            Instr::Alloc { dst: target, ty: ptr(), pos: pos("target.go", 1) },
            Instr::Append {
                dst: s2,
                slice: s,
                elem: Some(target),
                elem_ty: ptr(),
                pos: pos("main.go", 2),
            },
            Instr::Load { dst: readback, addr: s2, ty: ptr() },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, s2), false);
    queries.insert(query(main, readback), false);
    let (out, _solved) = run(&prog, "main", queries);

    let grown = out.queries.get(&query(main, s2)).unwrap();
    assert_eq!(grown.labels.len(), 2, "the grown slice aliases both the old and the fresh backing array");

    let back = out.queries.get(&query(main, readback)).unwrap();
    assert_eq!(back.labels.len(), 1);
    assert!(back.labels[0].path().contains("target.go"));
}

/// Scenario: a multi-field struct threaded through a field store/load, a
/// nested field read, and a static-call boundary. Every flattened field of
/// a composite value must keep its own identity end to end: the struct's
/// own allocation only has one node per field (spec.md §4.1 flattening), so
/// a generator that only wires the head node would silently merge or drop
/// every field past the first.
#[test]
fn struct_fields_survive_store_load_and_a_call_boundary() {
    let mut b = ProgramBuilder::new();

    let inner = Ty::Struct(vec![
        StructField { name: "x".into(), ty: ptr() },
        StructField { name: "y".into(), ty: ptr() },
    ]);
    let outer = Ty::Struct(vec![
        StructField { name: "inner".into(), ty: inner.clone() },
        StructField { name: "tag".into(), ty: ptr() },
    ]);

    // `Through(p Inner) Inner { return p }`: a pass-through call whose sole
    // job is to prove a two-node struct argument survives a `StaticCall`
    // into its result unscathed.
    let through = b.add_function("Through", Ty::Invalid, vec![ValueId(0)], vec![inner.clone()], vec![inner.clone()]);
    b.push_block(through, vec![Instr::Return { results: vec![ValueId(0)] }]);

    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);
    let x_tgt = ValueId(0);
    let y_tgt = ValueId(1);
    let tag_tgt = ValueId(2);
    let outer_ptr = ValueId(3);
    let inner_addr = ValueId(4);
    let x_addr = ValueId(5);
    let y_addr = ValueId(6);
    let tag_addr = ValueId(7);
    let outer_val = ValueId(8);
    let inner_val = ValueId(9);
    let tag_val = ValueId(10);
    let call_result = ValueId(11);
    let x_readback = ValueId(12);
    let y_readback = ValueId(13);

    b.push_block(
        main,
        vec![
            Instr::Alloc { dst: x_tgt, ty: ptr(), pos: pos("x.go", 1) },
            Instr::Alloc { dst: y_tgt, ty: ptr(), pos: pos("y.go", 1) },
            Instr::Alloc { dst: tag_tgt, ty: ptr(), pos: pos("tag.go", 1) },
            Instr::Alloc { dst: outer_ptr, ty: outer.clone(), pos: pos("outer.go", 1) },
            Instr::FieldAddr { dst: inner_addr, base: outer_ptr, struct_ty: outer.clone(), field_index: 0 },
            Instr::FieldAddr { dst: x_addr, base: inner_addr, struct_ty: inner.clone(), field_index: 0 },
            Instr::Store { addr: x_addr, value: x_tgt, ty: ptr() },
            Instr::FieldAddr { dst: y_addr, base: inner_addr, struct_ty: inner.clone(), field_index: 1 },
            Instr::Store { addr: y_addr, value: y_tgt, ty: ptr() },
            Instr::FieldAddr { dst: tag_addr, base: outer_ptr, struct_ty: outer.clone(), field_index: 1 },
            Instr::Store { addr: tag_addr, value: tag_tgt, ty: ptr() },
            // One `Load` over the whole (3-node) outer struct: must populate
            // all three fields, not just the head.
            Instr::Load { dst: outer_val, addr: outer_ptr, ty: outer.clone() },
            Instr::FieldRead { dst: inner_val, base: outer_val, struct_ty: outer.clone(), field_index: 0 },
            Instr::FieldRead { dst: tag_val, base: outer_val, struct_ty: outer.clone(), field_index: 1 },
            Instr::StaticCall {
                dst: Some(call_result),
                result_ty: inner.clone(),
                callee: through,
                args: vec![inner_val],
                pos: pos("main.go", 1),
            },
            Instr::FieldRead { dst: x_readback, base: call_result, struct_ty: inner.clone(), field_index: 0 },
            Instr::FieldRead { dst: y_readback, base: call_result, struct_ty: inner, field_index: 1 },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, x_readback), false);
    queries.insert(query(main, y_readback), false);
    queries.insert(query(main, tag_val), false);
    let (out, _solved) = run(&prog, "main", queries);

    let x_answer = out.queries.get(&query(main, x_readback)).unwrap();
    let y_answer = out.queries.get(&query(main, y_readback)).unwrap();
    let tag_answer = out.queries.get(&query(main, tag_val)).unwrap();

    assert_eq!(x_answer.labels.len(), 1);
    assert!(x_answer.labels[0].path().contains("x.go"));
    assert_eq!(y_answer.labels.len(), 1);
    assert!(y_answer.labels[0].path().contains("y.go"));
    assert_eq!(tag_answer.labels.len(), 1);
    assert!(tag_answer.labels[0].path().contains("tag.go"));
}

/// Scenario: `copy()` over a multi-field element type. Each field of the
/// element must propagate through its own temporary independently of the
/// others, not just the element's first field (spec.md §4.4 "Built-in
/// rules").
#[test]
fn copy_builtin_propagates_every_field_of_a_composite_element() {
    let mut b = ProgramBuilder::new();
    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);

    let pair = Ty::Struct(vec![
        StructField { name: "a".into(), ty: ptr() },
        StructField { name: "b".into(), ty: ptr() },
    ]);

    let a_tgt = ValueId(0);
    let b_tgt = ValueId(1);
    let pair_ptr = ValueId(2);
    let a_addr = ValueId(3);
    let b_addr = ValueId(4);
    let pair_val = ValueId(5);
    let src_slice = ValueId(6);
    let grown_src = ValueId(7);
    let dst_slice = ValueId(8);
    let copy_count = ValueId(9);
    let dst_val = ValueId(10);
    let a_readback = ValueId(11);
    let b_readback = ValueId(12);

    b.push_block(
        main,
        vec![
            Instr::Alloc { dst: a_tgt, ty: ptr(), pos: pos("ca.go", 1) },
            Instr::Alloc { dst: b_tgt, ty: ptr(), pos: pos("cb.go", 1) },
            Instr::Alloc { dst: pair_ptr, ty: pair.clone(), pos: pos("pair.go", 1) },
            Instr::FieldAddr { dst: a_addr, base: pair_ptr, struct_ty: pair.clone(), field_index: 0 },
            Instr::Store { addr: a_addr, value: a_tgt, ty: ptr() },
            Instr::FieldAddr { dst: b_addr, base: pair_ptr, struct_ty: pair.clone(), field_index: 1 },
            Instr::Store { addr: b_addr, value: b_tgt, ty: ptr() },
            Instr::Load { dst: pair_val, addr: pair_ptr, ty: pair.clone() },
            Instr::MakeSlice { dst: src_slice, elem_ty: pair.clone(), pos: pos("src.go", 1) },
            Instr::Append {
                dst: grown_src,
                slice: src_slice,
                elem: Some(pair_val),
                elem_ty: pair.clone(),
                pos: pos("src.go", 2),
            },
            Instr::MakeSlice { dst: dst_slice, elem_ty: pair.clone(), pos: pos("dst.go", 1) },
            Instr::BuiltinCopy { dst: copy_count, src: grown_src, elem_ty: pair.clone() },
            Instr::Load { dst: dst_val, addr: dst_slice, ty: pair.clone() },
            Instr::FieldRead { dst: a_readback, base: dst_val, struct_ty: pair.clone(), field_index: 0 },
            Instr::FieldRead { dst: b_readback, base: dst_val, struct_ty: pair, field_index: 1 },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, a_readback), false);
    queries.insert(query(main, b_readback), false);
    let (out, _solved) = run(&prog, "main", queries);

    let a_answer = out.queries.get(&query(main, a_readback)).unwrap();
    let b_answer = out.queries.get(&query(main, b_readback)).unwrap();

    assert_eq!(a_answer.labels.len(), 1);
    assert!(a_answer.labels[0].path().contains("ca.go"));
    assert_eq!(b_answer.labels.len(), 1);
    assert!(b_answer.labels[0].path().contains("cb.go"));
}

/// Scenario: context-sensitive accessor. `G` is a trivial one-instruction
/// passthrough (`return p`), eligible for per-callsite cloning under the
/// default policy (spec.md §4.4 clause c). Two callers passing distinct
/// pointers must each see only their own argument's label in `G`'s result —
/// proof that `StaticCall` actually gets a fresh contour per call site.
#[test]
fn short_simple_function_gets_independent_contours_per_call_site() {
    let mut b = ProgramBuilder::new();

    let g = b.add_function("G", Ty::Invalid, vec![ValueId(0)], vec![ptr()], vec![ptr()]);
    b.push_block(g, vec![Instr::Return { results: vec![ValueId(0)] }]);

    let main = b.add_function("main", Ty::Invalid, vec![], vec![], vec![]);
    let x = ValueId(0);
    let y = ValueId(1);
    let rx = ValueId(2);
    let ry = ValueId(3);
    b.push_block(
        main,
        vec![
            Instr::Alloc { dst: x, ty: ptr(), pos: pos("x.go", 1) },
            Instr::Alloc { dst: y, ty: ptr(), pos: pos("y.go", 1) },
            Instr::StaticCall {
                dst: Some(rx),
                result_ty: ptr(),
                callee: g,
                args: vec![x],
                pos: pos("main.go", 1),
            },
            Instr::StaticCall {
                dst: Some(ry),
                result_ty: ptr(),
                callee: g,
                args: vec![y],
                pos: pos("main.go", 2),
            },
            Instr::Return { results: vec![] },
        ],
    );
    b.mark_entry(main);

    let prog = b.build();
    let mut queries = BTreeMap::new();
    queries.insert(query(main, rx), false);
    queries.insert(query(main, ry), false);
    let (out, _solved) = run(&prog, "main", queries);

    let rx_answer = out.queries.get(&query(main, rx)).unwrap();
    let ry_answer = out.queries.get(&query(main, ry)).unwrap();

    assert_eq!(rx_answer.labels.len(), 1);
    assert_eq!(ry_answer.labels.len(), 1);
    assert!(rx_answer.labels[0].path().contains("x.go"));
    assert!(ry_answer.labels[0].path().contains("y.go"));
    assert_ne!(
        rx_answer.labels[0].object, ry_answer.labels[0].object,
        "each call site's own argument must not leak into the other's result"
    );
}
