//! The constraint generator (spec.md §4.4): walks reachable SSA, creates
//! nodes for values and allocations, and emits constraints; discovers new
//! functions on demand in RTA style.

pub mod builtins;
pub mod contour;
pub mod policy;

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::{Config, Hooks};
use crate::constraints::{Constraint, ConstraintSet, InvokeBlock};
use crate::error::{AnalysisError, Warning};
use crate::flatten::{self, BasicKind, Ty};
use crate::ids::{AllocSite, NodeId, NodeTable, ObjectFlags, ObjectId, TypeObjectCache};
use crate::ir::{self, BlockId, FunctionId, Instr, MethodId, Program, SourcePosition, ValueId};

use contour::ContourTable;

/// A call-graph node: `(function, object_id, callersite_or_none)` (spec.md
/// §3 "Call-graph node (cgn)"). Dense append-only id, like every other id
/// in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CgNodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallSiteId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CgNode {
    /// `None` only for the synthetic root cgn (spec.md §3 "The root of the
    /// call graph is a synthetic cgn that calls each program entry
    /// point").
    pub function: Option<FunctionId>,
    pub object: ObjectId,
    pub caller_site: Option<CallSiteId>,
}

/// Associated with each SSA call instruction: the instruction's position
/// and a `targets` node whose points-to set will, upon solving, name every
/// callable reached through this site (spec.md §3 "Call site").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub caller: CgNodeId,
    pub pos: SourcePosition,
    pub targets: NodeId,
}

/// The node layout of a function contour: `[identity, params.., results..]`
/// (spec.md §3 "Function object (contour)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContourLayout {
    pub identity: NodeId,
    pub params: Vec<NodeId>,
    pub results: Vec<NodeId>,
}

/// Final output of generation: the node table, the accumulated
/// constraints, and the call-graph skeleton. The solver consumes this and
/// may extend all three further while resolving `invoke`/reflection
/// constraints.
pub struct GenResult {
    pub nodes: NodeTable,
    pub constraints: ConstraintSet,
    /// Carries the `shared`/`per_site` memoization tables along with the
    /// cgns and layouts themselves, so the solver's own contour lookups
    /// (during `invoke` resolution) land on the exact same contour the
    /// generator already built rather than allocating a duplicate.
    pub contours: ContourTable,
    pub call_sites: Vec<CallSite>,
    pub call_edges: Vec<(CgNodeId, CallSiteId, CgNodeId)>,
    pub root: CgNodeId,
    pub warnings: Vec<Warning>,
    pub type_cache: TypeObjectCache,
    pub panic_node: NodeId,
    /// Every node a given SSA value was assigned to, across every contour
    /// that instantiated its defining function (spec.md §4.6 "combine the
    /// points-to sets of all its recorded node ids across contexts").
    pub value_nodes: HashMap<(FunctionId, ValueId), Vec<NodeId>>,
}

pub struct Generator<'a> {
    program: &'a Program,
    hooks: &'a Hooks,
    nodes: NodeTable,
    constraints: ConstraintSet,
    contours: ContourTable,
    call_sites: Vec<CallSite>,
    call_edges: Vec<(CgNodeId, CallSiteId, CgNodeId)>,
    genq: VecDeque<CgNodeId>,
    processed: HashSet<CgNodeId>,
    warnings: Vec<Warning>,
    type_cache: TypeObjectCache,
    panic_node: NodeId,
    print_probes: HashMap<SourcePosition, NodeId>,
    value_nodes: HashMap<(FunctionId, ValueId), Vec<NodeId>>,
}

/// Generates the full constraint set for `program` under `config`.
pub fn generate(program: &Program, config: &Config, hooks: &Hooks) -> Result<GenResult, AnalysisError> {
    config.validate()?;
    let mut gen = Generator::new(program, hooks);
    gen.run(config)?;
    Ok(gen.into_result())
}

impl<'a> Generator<'a> {
    fn new(program: &'a Program, hooks: &'a Hooks) -> Generator<'a> {
        let mut nodes = NodeTable::new();
        let panic_node = nodes.add_one(Ty::Basic(BasicKind::Interface), "panic", None);
        Generator {
            program,
            hooks,
            nodes,
            constraints: ConstraintSet::empty(),
            contours: ContourTable::new(),
            call_sites: Vec::new(),
            call_edges: Vec::new(),
            genq: VecDeque::new(),
            processed: HashSet::new(),
            warnings: Vec::new(),
            type_cache: TypeObjectCache::new(),
            panic_node,
            print_probes: HashMap::new(),
            value_nodes: HashMap::new(),
        }
    }

    fn run(&mut self, config: &Config) -> Result<(), AnalysisError> {
        let root = self.make_root_cgn();
        for pkg in &config.entry_packages {
            for f in &self.program.functions {
                if &f.name == pkg || f.name.starts_with(&format!("{pkg}.")) {
                    let entry_cgn = self.make_function_object(f.id, None);
                    self.add_call_edge(root, None, entry_cgn);
                }
            }
        }
        for entry in &self.program.entry_points {
            let entry_cgn = self.make_function_object(*entry, None);
            self.add_call_edge(root, None, entry_cgn);
        }

        while let Some(cgn) = self.genq.pop_front() {
            if !self.processed.insert(cgn) {
                continue;
            }
            self.generate_contour_body(cgn)?;
        }
        Ok(())
    }

    fn into_result(self) -> GenResult {
        GenResult {
            nodes: self.nodes,
            constraints: self.constraints,
            contours: self.contours,
            call_sites: self.call_sites,
            call_edges: self.call_edges,
            root: CgNodeId(0),
            warnings: self.warnings,
            type_cache: self.type_cache,
            panic_node: self.panic_node,
            value_nodes: self.value_nodes,
        }
    }

    fn make_root_cgn(&mut self) -> CgNodeId {
        let head = self.nodes.next_id();
        let id = CgNodeId(self.contours.cg_nodes.len() as u32);
        self.contours.cg_nodes.push(CgNode {
            function: None,
            object: ObjectId(head),
            caller_site: None,
        });
        let obj = self.nodes.end_object(
            head,
            Some(id),
            AllocSite {
                description: "root".to_owned(),
                function: "<root>".to_owned(),
            },
            ObjectFlags::FUNCTION,
        );
        debug_assert_eq!(obj.0, head);
        self.contours.layouts.insert(
            id,
            ContourLayout {
                identity: head,
                params: vec![],
                results: vec![],
            },
        );
        id
    }

    fn add_call_edge(&mut self, caller: CgNodeId, site: Option<CallSiteId>, callee: CgNodeId) {
        let site = site.unwrap_or_else(|| self.synthetic_call_site(caller));
        self.call_edges.push((caller, site, callee));
    }

    fn synthetic_call_site(&mut self, caller: CgNodeId) -> CallSiteId {
        let targets = self.nodes.add_one(Ty::Basic(BasicKind::Func), "entry-targets", None);
        let id = CallSiteId(self.call_sites.len() as u32);
        self.call_sites.push(CallSite {
            caller,
            pos: SourcePosition {
                file: "<root>".to_owned(),
                line: 0,
            },
            targets,
        });
        id
    }

    /// Allocates (or returns the memoized) contour for `func_id`, enqueuing
    /// its body for processing if this is the first time it is seen.
    fn make_function_object(&mut self, func_id: FunctionId, caller_site: Option<CallSiteId>) -> CgNodeId {
        let (cgn, is_new) = self.contours.get_or_create(&mut self.nodes, self.program, func_id, caller_site);
        if is_new {
            self.genq.push_back(cgn);
        }
        cgn
    }

    fn new_call_site(&mut self, caller: CgNodeId, pos: SourcePosition) -> CallSiteId {
        let targets = self.nodes.add_one(Ty::Basic(BasicKind::Func), "targets", None);
        let id = CallSiteId(self.call_sites.len() as u32);
        self.call_sites.push(CallSite { caller, pos, targets });
        id
    }

    /// Walks one contour's body. Flow-insensitive: generation order over
    /// instructions within a function does not affect the result (spec.md
    /// §5). The per-function local value map is local to this call and is
    /// dropped (released) when it returns (spec.md §5 "intermediate
    /// local-value maps ... are released after generating that function's
    /// constraints").
    fn generate_contour_body(&mut self, cgn: CgNodeId) -> Result<(), AnalysisError> {
        let func_id = match self.contours.function_of(cgn) {
            Some(f) => f,
            None => return Ok(()),
        };
        let func = self.program.function(func_id).clone();
        let layout = self.contours.layout(cgn).clone();

        let mut local: HashMap<ValueId, NodeId> = HashMap::new();
        for (p, n) in func.params.iter().zip(layout.params.iter()) {
            local.insert(*p, *n);
        }

        // Pre-scan: every value-producing instruction gets a node before we
        // emit any instruction constraints, so forward references resolve.
        for blk in &func.blocks {
            for instr in &blk.instrs {
                self.prescan_instr(&mut local, instr, &func.name);
            }
        }

        for blk in &func.blocks {
            for instr in &blk.instrs {
                self.gen_instr(cgn, &layout, &mut local, instr, &func.name)?;
            }
        }

        for (v, n) in &local {
            self.value_nodes.entry((func_id, *v)).or_default().push(*n);
        }
        Ok(())
    }

    pub(crate) fn value_node(&self, local: &HashMap<ValueId, NodeId>, v: ValueId) -> NodeId {
        local.get(&v).copied().unwrap_or(NodeId::SENTINEL)
    }

    fn prescan_instr(&mut self, local: &mut HashMap<ValueId, NodeId>, instr: &Instr, func_name: &str) {
        let mut alloc = |nodes: &mut NodeTable, local: &mut HashMap<ValueId, NodeId>, dst: ValueId, ty: &Ty| {
            if !local.contains_key(&dst) {
                let n = nodes.add_many(ty, format!("{func_name}:v"));
                local.insert(dst, n);
            }
        };

        match instr {
            Instr::Alloc { dst, .. }
            | Instr::MakeSlice { dst, .. }
            | Instr::IndexAddr { dst, .. }
            | Instr::FieldAddr { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Pointer)),
            Instr::MakeChan { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Chan)),
            Instr::MakeMap { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Map)),
            Instr::MakeInterface { dst, .. } | Instr::ChangeInterface { dst, .. } => {
                alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Interface))
            }
            Instr::Load { dst, ty, .. } => alloc(&mut self.nodes, local, *dst, ty),
            Instr::Recv { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Interface)),
            Instr::FieldRead { dst, struct_ty, field_index, .. } => {
                let fty = flatten::field_type(struct_ty, *field_index);
                alloc(&mut self.nodes, local, *dst, &fty);
            }
            Instr::MapLookup { dst, val_ty, .. } => alloc(&mut self.nodes, local, *dst, val_ty),
            Instr::MapRange { dst, key_ty, val_ty, .. } => {
                if !local.contains_key(dst) {
                    let ok = self.nodes.add_one(Ty::Basic(BasicKind::NonPointer), "range-ok", None);
                    self.nodes
                        .add_many(&Ty::Tuple(vec![key_ty.clone(), val_ty.clone()]), "range-kv");
                    local.insert(*dst, ok);
                }
            }
            Instr::TypeAssert { dst, asserted_ty, .. } => alloc(&mut self.nodes, local, *dst, asserted_ty),
            Instr::Invoke { dst: Some(dst), result_ty, .. }
            | Instr::StaticCall { dst: Some(dst), result_ty, .. }
            | Instr::ClosureCall { dst: Some(dst), result_ty, .. } => {
                alloc(&mut self.nodes, local, *dst, result_ty)
            }
            Instr::ChangeType { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Pointer)),
            Instr::Phi { dst, .. } | Instr::Select { dst, .. } => {
                alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Pointer))
            }
            Instr::Append { dst, elem_ty, .. } => {
                alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Slice));
                let _ = elem_ty;
            }
            Instr::BuiltinCopy { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Slice)),
            Instr::Recover { dst: Some(dst), result_ty } => alloc(&mut self.nodes, local, *dst, result_ty),
            Instr::IntrinsicCall { dst: Some(dst), .. } => {
                alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Interface))
            }
            Instr::UnsafeConvert { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Pointer)),
            Instr::FuncValue { dst, .. } => alloc(&mut self.nodes, local, *dst, &Ty::Basic(BasicKind::Func)),
            _ => {}
        }
    }

    #[allow(clippy::too_many_lines)]
    fn gen_instr(
        &mut self,
        cgn: CgNodeId,
        layout: &ContourLayout,
        local: &mut HashMap<ValueId, NodeId>,
        instr: &Instr,
        func_name: &str,
    ) -> Result<(), AnalysisError> {
        match instr {
            Instr::Alloc { dst, ty, pos } => {
                let dst_n = self.value_node(local, *dst);
                let head = self.nodes.add_many(ty, format!("{func_name}:alloc"));
                let obj = self.nodes.end_object(
                    head,
                    Some(cgn),
                    AllocSite {
                        description: format!("alloc@{pos}"),
                        function: func_name.to_owned(),
                    },
                    ObjectFlags::empty(),
                );
                self.emit(Constraint::Addr { dst: dst_n, obj: obj.0 });
            }
            Instr::MakeSlice { dst, elem_ty, pos } | Instr::MakeChan { dst, elem_ty, pos } => {
                let dst_n = self.value_node(local, *dst);
                let head = self.nodes.add_many(elem_ty, format!("{func_name}:backing"));
                let obj = self.nodes.end_object(
                    head,
                    Some(cgn),
                    AllocSite {
                        description: format!("make@{pos}"),
                        function: func_name.to_owned(),
                    },
                    ObjectFlags::empty(),
                );
                self.emit(Constraint::Addr { dst: dst_n, obj: obj.0 });
            }
            Instr::MakeMap { dst, key_ty, val_ty, pos } => {
                let dst_n = self.value_node(local, *dst);
                let head = self
                    .nodes
                    .add_many(&Ty::Tuple(vec![key_ty.clone(), val_ty.clone()]), format!("{func_name}:mapbacking"));
                let obj = self.nodes.end_object(
                    head,
                    Some(cgn),
                    AllocSite {
                        description: format!("makemap@{pos}"),
                        function: func_name.to_owned(),
                    },
                    ObjectFlags::empty(),
                );
                self.nodes.set_key_size(obj, flatten::sizeof(key_ty));
                self.emit(Constraint::Addr { dst: dst_n, obj: obj.0 });
            }
            Instr::MakeInterface { dst, src, dynamic_ty, pos } => {
                self.emit_make_interface(cgn, *dst, *src, dynamic_ty, pos, local, func_name);
            }
            Instr::Load { dst, addr, ty } => {
                let dst_n = self.value_node(local, *dst);
                let addr_n = self.value_node(local, *addr);
                self.emit_stepped_load(ty, 0, dst_n, addr_n);
            }
            Instr::Store { addr, value, ty } => {
                let addr_n = self.value_node(local, *addr);
                let value_n = self.value_node(local, *value);
                self.emit_stepped_store(ty, 0, addr_n, value_n);
            }
            Instr::Send { chan, value } => {
                let chan_n = self.value_node(local, *chan);
                let value_n = self.value_node(local, *value);
                self.emit(Constraint::Store {
                    offset: 0,
                    dst: chan_n,
                    src: value_n,
                });
            }
            Instr::Recv { dst, chan } => {
                let dst_n = self.value_node(local, *dst);
                let chan_n = self.value_node(local, *chan);
                self.emit(Constraint::Load {
                    offset: 0,
                    dst: dst_n,
                    src: chan_n,
                });
            }
            Instr::FieldAddr { dst, base, struct_ty, field_index } => {
                let dst_n = self.value_node(local, *dst);
                let base_n = self.value_node(local, *base);
                let off = flatten::offset_of(struct_ty, *field_index) as i64;
                self.emit(Constraint::OffsetAddr {
                    offset: off,
                    dst: dst_n,
                    src: base_n,
                });
            }
            Instr::IndexAddr { dst, base } => {
                let dst_n = self.value_node(local, *dst);
                let base_n = self.value_node(local, *base);
                self.emit(Constraint::OffsetAddr {
                    offset: 1,
                    dst: dst_n,
                    src: base_n,
                });
            }
            Instr::FieldRead { dst, base, struct_ty, field_index } => {
                let dst_n = self.value_node(local, *dst);
                let base_n = self.value_node(local, *base);
                let off = flatten::offset_of(struct_ty, *field_index);
                let field_ty = flatten::field_type(struct_ty, *field_index);
                self.emit_stepped_copy(&field_ty, dst_n, base_n.offset(off));
            }
            Instr::MapUpdate { map, key, value, key_ty, val_ty } => {
                let map_n = self.value_node(local, *map);
                let key_n = self.value_node(local, *key);
                let val_n = self.value_node(local, *value);
                self.emit_stepped_store(key_ty, 0, map_n, key_n);
                self.emit_stepped_store(val_ty, flatten::sizeof(key_ty), map_n, val_n);
            }
            Instr::MapLookup { dst, map, key_ty, val_ty, .. } => {
                let dst_n = self.value_node(local, *dst);
                let map_n = self.value_node(local, *map);
                self.emit_stepped_load(val_ty, flatten::sizeof(key_ty), dst_n, map_n);
            }
            Instr::MapRange { dst, iter_map, key_ty, val_ty } => {
                let dst_n = self.value_node(local, *dst);
                let map_n = self.value_node(local, *iter_map);
                let kv_ty = Ty::Tuple(vec![key_ty.clone(), val_ty.clone()]);
                self.emit_stepped_load(&kv_ty, 0, dst_n.offset(1), map_n);
            }
            Instr::TypeAssert { dst, src, asserted_ty, extracts_payload } => {
                let dst_n = self.value_node(local, *dst);
                let src_n = self.value_node(local, *src);
                self.emit(Constraint::TypeAssert {
                    asserted_ty: asserted_ty.clone(),
                    dst: dst_n,
                    src: src_n,
                    extracts_payload: *extracts_payload,
                });
            }
            Instr::Invoke { dst, iface, method, args, pos, .. } => {
                self.emit_invoke(cgn, *dst, *iface, method, args, pos, local);
            }
            Instr::StaticCall { dst, callee, args, pos, .. } => {
                self.emit_static_call(cgn, *dst, *callee, args, pos, local);
            }
            Instr::ClosureCall { dst, closure, args, pos, .. } => {
                self.emit_closure_call(cgn, *dst, *closure, args, pos, local);
            }
            Instr::ChangeInterface { dst, src } | Instr::ChangeType { dst, src } => {
                let dst_n = self.value_node(local, *dst);
                let src_n = self.value_node(local, *src);
                self.emit(Constraint::Copy { dst: dst_n, src: src_n });
            }
            Instr::Phi { dst, edges } => {
                let dst_n = self.value_node(local, *dst);
                for e in edges {
                    let src_n = self.value_node(local, *e);
                    self.emit(Constraint::Copy { dst: dst_n, src: src_n });
                }
            }
            Instr::Select { dst, t, f, .. } => {
                let dst_n = self.value_node(local, *dst);
                for src in [t, f] {
                    let src_n = self.value_node(local, *src);
                    self.emit(Constraint::Copy { dst: dst_n, src: src_n });
                }
            }
            Instr::Return { results } => {
                let result_types = self
                    .contours
                    .function_of(cgn)
                    .map(|f| self.program.function(f).results.clone())
                    .unwrap_or_default();
                for i in 0..results.len().min(layout.results.len()) {
                    let src_n = self.value_node(local, results[i]);
                    let rty = result_types.get(i).cloned().unwrap_or(Ty::Invalid);
                    self.emit_stepped_copy(&rty, layout.results[i], src_n);
                }
            }
            Instr::Append { dst, slice, elem, elem_ty, pos } => {
                builtins::gen_append(self, cgn, *dst, *slice, *elem, elem_ty, pos, local, func_name);
            }
            Instr::BuiltinCopy { dst, src, elem_ty } => {
                builtins::gen_copy(self, *dst, *src, elem_ty, local, func_name);
            }
            Instr::Panic { value } => {
                let v_n = self.value_node(local, *value);
                let panic_node = self.panic_node;
                self.emit(Constraint::Copy {
                    dst: panic_node,
                    src: v_n,
                });
            }
            Instr::Recover { dst, .. } => {
                if let Some(dst) = dst {
                    let dst_n = self.value_node(local, *dst);
                    let panic_node = self.panic_node;
                    self.emit(Constraint::Copy {
                        dst: dst_n,
                        src: panic_node,
                    });
                }
            }
            Instr::Print { args, pos } => {
                builtins::gen_print(self, args, pos, local);
            }
            Instr::NoEffectBuiltin { .. } => {}
            Instr::IntrinsicCall { dst, qualified_name, args, const_args, pos } => {
                crate::intrinsics::generate(self, cgn, *dst, qualified_name, args, const_args, pos, local)?;
            }
            Instr::UnsafeConvert { dst, src, dest_pointee_ty, source_package, pos } => {
                self.emit_unsafe_convert(cgn, *dst, *src, dest_pointee_ty, source_package, pos, local, func_name);
            }
            Instr::FuncValue { dst, func } => {
                let dst_n = self.value_node(local, *dst);
                let callee_cgn = self.make_function_object(*func, None);
                let identity = self.contours.layout(callee_cgn).identity;
                self.emit(Constraint::Addr { dst: dst_n, obj: identity });
            }
            Instr::Jump { .. } | Instr::Branch { .. } => {}
        }
        Ok(())
    }

    fn emit_make_interface(
        &mut self,
        cgn: CgNodeId,
        dst: ValueId,
        src: ValueId,
        dynamic_ty: &Ty,
        pos: &SourcePosition,
        local: &HashMap<ValueId, NodeId>,
        func_name: &str,
    ) {
        let dst_n = self.value_node(local, dst);
        let src_n = self.value_node(local, src);
        let head = self.nodes.add_one(dynamic_ty.clone(), format!("{func_name}:iface-tag"), None);
        self.nodes.add_many(dynamic_ty, format!("{func_name}:iface-payload"));
        let obj = self.nodes.end_object(
            head,
            Some(cgn),
            AllocSite {
                description: format!("makeinterface@{pos}"),
                function: func_name.to_owned(),
            },
            ObjectFlags::TAGGED,
        );
        self.emit(Constraint::Copy {
            dst: head.offset(1),
            src: src_n,
        });
        self.emit(Constraint::Addr { dst: dst_n, obj: obj.0 });

        // Any method this dynamic type could later be `invoke`d through is
        // reachable from the moment a value is boxed into an interface;
        // materialize those contours now so the solver's invoke resolution
        // only has to wire copies, never generate a body on the fly.
        if let Some(methods) = self.program.method_sets.get(dynamic_ty).cloned() {
            for m in methods {
                if let Some(callee) = self.program.method_impls.get(&m).copied() {
                    self.make_function_object(callee, None);
                }
            }
        }
    }

    fn emit_invoke(
        &mut self,
        cgn: CgNodeId,
        dst: Option<ValueId>,
        iface: ValueId,
        method: &MethodId,
        args: &[ValueId],
        pos: &SourcePosition,
        local: &HashMap<ValueId, NodeId>,
    ) {
        let iface_n = self.value_node(local, iface);
        let site = self.new_call_site(cgn, pos.clone());
        let block = InvokeBlock {
            args: args.iter().map(|a| self.value_node(local, *a)).collect(),
            result: dst.map(|d| self.value_node(local, d)),
            targets: self.call_sites[site.0 as usize].targets,
            call_pos: pos.clone(),
            call_site: site,
        };
        self.emit(Constraint::Invoke {
            method_name: method.name.clone(),
            iface: iface_n,
            block,
        });
    }

    fn emit_static_call(
        &mut self,
        cgn: CgNodeId,
        dst: Option<ValueId>,
        callee: FunctionId,
        args: &[ValueId],
        pos: &SourcePosition,
        local: &HashMap<ValueId, NodeId>,
    ) {
        let site = self.new_call_site(cgn, pos.clone());
        let callee_cgn = self.make_function_object(callee, Some(site));
        self.add_call_edge(cgn, Some(site), callee_cgn);
        let layout = self.contours.layout(callee_cgn).clone();
        let callee_func = self.program.function(callee);
        let param_types = callee_func.param_types.clone();
        let result_types = callee_func.results.clone();
        for i in 0..args.len().min(layout.params.len()) {
            let arg_n = self.value_node(local, args[i]);
            let pty = param_types.get(i).cloned().unwrap_or(Ty::Invalid);
            self.emit_stepped_copy(&pty, layout.params[i], arg_n);
        }
        if let (Some(dst), Some(&result)) = (dst, layout.results.first()) {
            let dst_n = self.value_node(local, dst);
            let rty = result_types.first().cloned().unwrap_or(Ty::Invalid);
            self.emit_stepped_copy(&rty, dst_n, result);
        }
    }

    fn emit_closure_call(
        &mut self,
        cgn: CgNodeId,
        dst: Option<ValueId>,
        closure: ValueId,
        args: &[ValueId],
        pos: &SourcePosition,
        local: &HashMap<ValueId, NodeId>,
    ) {
        // The function value's own P/R block is unknown statically; the
        // solver wires args/results directly against whichever function
        // objects `closure` turns out to point to (spec.md §4.4 "dynamic
        // (closure) call" — no method-name lookup, unlike `invoke`).
        let closure_n = self.value_node(local, closure);
        let site = self.new_call_site(cgn, pos.clone());
        let block = InvokeBlock {
            args: args.iter().map(|a| self.value_node(local, *a)).collect(),
            result: dst.map(|d| self.value_node(local, d)),
            targets: self.call_sites[site.0 as usize].targets,
            call_pos: pos.clone(),
            call_site: site,
        };
        self.emit(Constraint::DynCall { closure: closure_n, block });
    }

    fn emit_unsafe_convert(
        &mut self,
        cgn: CgNodeId,
        dst: ValueId,
        _src: ValueId,
        dest_pointee_ty: &Ty,
        source_package: &str,
        pos: &SourcePosition,
        local: &HashMap<ValueId, NodeId>,
        func_name: &str,
    ) {
        const ALLOW_LISTED: &[&str] = &["unsafe", "runtime", "reflect"];
        let dst_n = self.value_node(local, dst);
        let head = self.nodes.add_many(dest_pointee_ty, format!("{func_name}:unsafe-conv"));
        let obj = self.nodes.end_object(
            head,
            Some(cgn),
            AllocSite {
                description: format!("unsafeconvert@{pos}"),
                function: func_name.to_owned(),
            },
            ObjectFlags::empty(),
        );
        self.emit(Constraint::Addr { dst: dst_n, obj: obj.0 });
        if !ALLOW_LISTED.contains(&source_package) {
            self.warn(
                pos.clone(),
                format!("unsafe pointer conversion from package `{source_package}` modeled as a fresh allocation"),
            );
        }
    }

    pub(crate) fn emit(&mut self, c: Constraint) {
        self.constraints.insert(c);
    }

    /// Emits one `Constraint::Copy` per scalar field of `ty`, copying
    /// `src.offset(i)` into `dst.offset(i)` for every flattened position
    /// (spec.md §4.3: aggregate-aware generators step through `offset`
    /// rather than touching only the head node).
    pub(crate) fn emit_stepped_copy(&mut self, ty: &Ty, dst: NodeId, src: NodeId) {
        for i in 0..flatten::sizeof(ty) {
            self.emit(Constraint::Copy {
                dst: dst.offset(i),
                src: src.offset(i),
            });
        }
    }

    /// Emits one `Constraint::Load` per scalar field of `ty`, each reading
    /// `*src + base_offset + i` into `dst.offset(i)`.
    pub(crate) fn emit_stepped_load(&mut self, ty: &Ty, base_offset: usize, dst: NodeId, src: NodeId) {
        for i in 0..flatten::sizeof(ty) {
            self.emit(Constraint::Load {
                offset: (base_offset + i) as i64,
                dst: dst.offset(i),
                src,
            });
        }
    }

    /// Emits one `Constraint::Store` per scalar field of `ty`, each writing
    /// `src.offset(i)` to `*dst + base_offset + i`.
    pub(crate) fn emit_stepped_store(&mut self, ty: &Ty, base_offset: usize, dst: NodeId, src: NodeId) {
        for i in 0..flatten::sizeof(ty) {
            self.emit(Constraint::Store {
                offset: (base_offset + i) as i64,
                dst,
                src: src.offset(i),
            });
        }
    }

    pub(crate) fn warn(&mut self, pos: SourcePosition, message: impl Into<String>) {
        self.warnings.push(Warning::new(pos, message));
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut NodeTable {
        &mut self.nodes
    }

    pub(crate) fn type_cache_mut(&mut self) -> &mut TypeObjectCache {
        &mut self.type_cache
    }

    pub(crate) fn current_cgn_object(&self, cgn: CgNodeId) -> ObjectId {
        self.contours.cg_nodes[cgn.0 as usize].object
    }

    /// Returns the canonical probe node for a print call site, creating it
    /// (and firing the print hook exactly once) the first time this source
    /// position is seen, regardless of how many contours reach it (spec.md
    /// §4.4, §4.6).
    pub(crate) fn probe_for(&mut self, pos: &SourcePosition) -> NodeId {
        if let Some(n) = self.print_probes.get(pos) {
            return *n;
        }
        let n = self.nodes.add_one(Ty::Basic(BasicKind::Interface), format!("probe@{pos}"), None);
        self.print_probes.insert(pos.clone(), n);
        self.hooks.fire_print(n);
        n
    }
}
