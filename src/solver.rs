//! The on-line cycle-detecting constraint solver (spec.md §4.5). Consumes a
//! `generator::GenResult` and propagates points-to sets to a fixed point,
//! unifying strongly connected components of the copy-subgraph as they are
//! discovered (an on-the-fly approximation of Nuutila's algorithm, built on
//! `petgraph`'s union-find and Tarjan SCC, the same crate the teacher uses
//! for its constraint/type graph in `constraints.rs`/`solver/constraint_graph.rs`).

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use petgraph::unionfind::UnionFind;

use crate::config::Hooks;
use crate::constraints::{
    AllocatingIntrinsic, Constraint, ContainerOp, IntrinsicConstraint, InvokeBlock,
};
use crate::error::{AnalysisError, Warning};
use crate::flatten::{BasicKind, Ty};
use crate::generator::contour::ContourTable;
use crate::generator::{CallSite, CallSiteId, CgNode, CgNodeId, ContourLayout, GenResult};
use crate::ids::{AllocSite, NodeId, NodeTable, ObjectFlags, ObjectId, TypeObjectCache};
use crate::ir::Program;

/// Final, solved state: everything a `generator::GenResult` carried, with
/// `pts` populated to a fixed point and any contours/constraints the solver
/// itself added while resolving `invoke`/reflection constraints.
pub struct SolveResult {
    pub nodes: NodeTable,
    pub pts: HashMap<NodeId, BTreeSet<NodeId>>,
    pub cg_nodes: Vec<CgNode>,
    pub layouts: indexmap::IndexMap<CgNodeId, ContourLayout>,
    pub call_sites: Vec<CallSite>,
    pub call_edges: Vec<(CgNodeId, CallSiteId, CgNodeId)>,
    pub root: CgNodeId,
    pub warnings: Vec<Warning>,
    pub value_nodes: HashMap<(crate::ir::FunctionId, crate::ir::ValueId), Vec<NodeId>>,
    /// Carried from the solver so callers can canonicalize a node id that
    /// was unified away during cycle contraction (`merge` drops the
    /// non-representative's `pts` entry entirely, so looking a query node up
    /// directly in `pts` without this step would wrongly see an empty set).
    uf: UnionFind<u32>,
}

impl SolveResult {
    /// `n`'s representative after union-find collapse.
    pub fn rep(&self, n: NodeId) -> NodeId {
        if n.is_sentinel() {
            return n;
        }
        NodeId(self.uf.find(n.0))
    }

    /// The points-to set for `n`, transparently following cycle-contraction
    /// union-find collapse.
    pub fn points_to(&self, n: NodeId) -> BTreeSet<NodeId> {
        self.pts.get(&self.rep(n)).cloned().unwrap_or_default()
    }
}

/// Runs `generator::generate`'s output to a fixed point.
pub fn solve(program: &Program, gen: GenResult, hooks: &Hooks) -> Result<SolveResult, AnalysisError> {
    let mut solver = Solver::new(program, gen, hooks);
    solver.run()?;
    Ok(solver.into_result())
}

struct Solver<'a> {
    program: &'a Program,
    hooks: &'a Hooks,
    nodes: NodeTable,
    contours: ContourTable,
    cg_nodes_by_object: HashMap<ObjectId, CgNodeId>,
    call_sites: Vec<CallSite>,
    call_edges: Vec<(CgNodeId, CallSiteId, CgNodeId)>,
    warnings: Vec<Warning>,
    type_cache: TypeObjectCache,
    chan_type_cache: HashMap<(Option<crate::ir::ChanDir>, Ty), ObjectId>,
    value_nodes: HashMap<(crate::ir::FunctionId, crate::ir::ValueId), Vec<NodeId>>,

    /// Union-find over node ids; `rep(n)` is the representative of the SCC
    /// (if any) `n` has been unified into.
    uf: UnionFind<u32>,
    /// `pts[rep(n)]` is the current points-to set.
    pts: HashMap<NodeId, BTreeSet<NodeId>>,
    /// What has already been propagated out of `rep(n)`, so `Δ` can be
    /// computed as `pts[rep(n)] \ seen[rep(n)]` (spec.md §4.5 main loop).
    seen: HashMap<NodeId, BTreeSet<NodeId>>,
    /// The copy-subgraph: `edges[src]` is every `dst` with a live
    /// `copy{dst,src}` edge (spec.md §4.3 "add edge `src -> dst`").
    edges: HashMap<NodeId, Vec<NodeId>>,
    /// Reverse index of complex constraints, keyed by the node whose `Δ`
    /// triggers them (spec.md §4.5 "register it in the `complex` list(s) of
    /// its source node(s)"). Stored sparsely per the design note in spec.md
    /// §9 ("usually empty; store it as a hashmap").
    complex: HashMap<NodeId, Vec<Constraint>>,
    /// Deferred two-level reflection container accesses (spec.md §4.4
    /// "`(Value).MapIndex`, ..."): registered against the node carrying the
    /// *payload* pointer (`tagged_head + 1`) once its owning tagged label is
    /// first seen, so a later load/store can be emitted once the concrete
    /// map/chan object the payload points to is known.
    pending_container: HashMap<NodeId, Vec<PendingContainer>>,
    work: VecDeque<NodeId>,
    in_work: HashSet<NodeId>,
    /// Bumped every time the copy graph changes materially; an SCC pass
    /// only re-runs when this has advanced since the last pass, so a
    /// saturated run doesn't re-Tarjan on every drained node.
    graph_version: u64,
    last_scc_version: u64,
}

#[derive(Clone, Copy)]
struct PendingContainer {
    op: ContainerOp,
    dst: Option<NodeId>,
    src: Option<NodeId>,
}

impl<'a> Solver<'a> {
    fn new(program: &'a Program, gen: GenResult, hooks: &'a Hooks) -> Solver<'a> {
        let n = gen.nodes.len() as u32;
        let cg_nodes_by_object = gen
            .contours
            .cg_nodes
            .iter()
            .enumerate()
            .map(|(i, cgn)| (cgn.object, CgNodeId(i as u32)))
            .collect();
        let mut solver = Solver {
            program,
            hooks,
            nodes: gen.nodes,
            contours: gen.contours,
            cg_nodes_by_object,
            call_sites: gen.call_sites,
            call_edges: gen.call_edges,
            warnings: gen.warnings,
            type_cache: gen.type_cache,
            chan_type_cache: HashMap::new(),
            value_nodes: gen.value_nodes,
            uf: UnionFind::new(n.max(1) as usize),
            pts: HashMap::new(),
            seen: HashMap::new(),
            edges: HashMap::new(),
            complex: HashMap::new(),
            pending_container: HashMap::new(),
            work: VecDeque::new(),
            in_work: HashSet::new(),
            graph_version: 0,
            last_scc_version: 0,
        };
        for c in gen.constraints {
            solver.install(c);
        }
        solver
    }

    fn into_result(self) -> SolveResult {
        SolveResult {
            nodes: self.nodes,
            pts: self.pts,
            cg_nodes: self.contours.cg_nodes,
            layouts: self.contours.layouts,
            call_sites: self.call_sites,
            call_edges: self.call_edges,
            root: CgNodeId(0),
            warnings: self.warnings,
            value_nodes: self.value_nodes,
            uf: self.uf,
        }
    }

    fn rep(&mut self, n: NodeId) -> NodeId {
        if n.is_sentinel() {
            return n;
        }
        NodeId(self.uf.find_mut(n.0))
    }

    /// Installs one generation-time constraint: `Addr` fires immediately
    /// (spec.md §4.5 "Initialization"); everything else is registered into
    /// the copy graph or the `complex` reverse index.
    fn install(&mut self, c: Constraint) {
        match c {
            Constraint::Addr { dst, obj } => {
                if !dst.is_sentinel() {
                    self.add_label(dst, obj);
                }
            }
            Constraint::Copy { dst, src } => self.add_copy_edge(src, dst),
            Constraint::Load { src, .. } => self.register_complex(src, c),
            Constraint::Store { dst, .. } => self.register_complex(dst, c),
            Constraint::OffsetAddr { src, .. } => self.register_complex(src, c),
            Constraint::TypeAssert { src, .. } => self.register_complex(src, c),
            Constraint::Invoke { iface, .. } => self.register_complex(iface, c),
            Constraint::DynCall { closure, .. } => self.register_complex(closure, c),
            Constraint::Intrinsic(ic) => self.install_intrinsic(ic),
        }
    }

    fn install_intrinsic(&mut self, ic: IntrinsicConstraint) {
        match ic {
            IntrinsicConstraint::TypeOf { src, .. } => self.register_complex(src, Constraint::Intrinsic(ic)),
            IntrinsicConstraint::ContainerAccess { container, .. } => {
                self.register_complex(container, Constraint::Intrinsic(ic))
            }
            // These three are one-time facts independent of any node's
            // points-to set, so they run once at install time rather than
            // waiting on a `Δ` (spec.md §4.4's allocating intrinsics read
            // their type arguments off the callsite, not off a pointer).
            IntrinsicConstraint::ChanOf { dir, elem_ty, dst } => self.solve_chan_of(dir, &elem_ty, dst),
            IntrinsicConstraint::Elem { elem_ty, dst } => self.solve_elem(&elem_ty, dst),
            IntrinsicConstraint::Allocating { kind, elem_ty, dst, call_site } => {
                self.solve_allocating(kind, &elem_ty, dst, &call_site)
            }
            IntrinsicConstraint::Zero { ty, dst, call_site } => self.solve_zero(&ty, dst, &call_site),
        }
    }

    fn register_complex(&mut self, trigger: NodeId, c: Constraint) {
        let r = self.rep(trigger);
        self.complex.entry(r).or_default().push(c);
    }

    fn add_copy_edge(&mut self, src: NodeId, dst: NodeId) {
        if src.is_sentinel() || dst.is_sentinel() {
            return;
        }
        let rs = self.rep(src);
        let rd = self.rep(dst);
        if rs == rd {
            return;
        }
        let list = self.edges.entry(rs).or_default();
        if !list.contains(&rd) {
            list.push(rd);
            self.graph_version += 1;
            // A freshly added edge may already need to flow existing labels
            // (the source's points-to set can be non-empty before the edge
            // itself exists, e.g. a `load` collapsed into a copy edge after
            // the pointer's label was already known).
            self.enqueue(rs);
        }
    }

    fn add_label(&mut self, n: NodeId, obj: NodeId) -> bool {
        let r = self.rep(n);
        let set = self.pts.entry(r).or_default();
        if set.insert(obj) {
            self.enqueue(r);
            true
        } else {
            false
        }
    }

    fn add_labels(&mut self, n: NodeId, objs: impl IntoIterator<Item = NodeId>) {
        let r = self.rep(n);
        let mut changed = false;
        {
            let set = self.pts.entry(r).or_default();
            for o in objs {
                changed |= set.insert(o);
            }
        }
        if changed {
            self.enqueue(r);
        }
    }

    fn enqueue(&mut self, n: NodeId) {
        if self.in_work.insert(n) {
            self.work.push_back(n);
        }
    }

    fn delta(&mut self, n: NodeId) -> BTreeSet<NodeId> {
        let current = self.pts.get(&n).cloned().unwrap_or_default();
        let prev = self.seen.entry(n).or_default();
        let d: BTreeSet<NodeId> = current.difference(prev).copied().collect();
        prev.extend(d.iter().copied());
        d
    }

    /// Main worklist loop (spec.md §4.5 "Main loop"). Runs an on-line SCC
    /// pass whenever the copy graph has grown since the last one, unifying
    /// any cycle found so repeated flow around it stops.
    fn run(&mut self) -> Result<(), AnalysisError> {
        log::debug!("solver: starting with {} worklist entries", self.work.len());
        let mut steps: u64 = 0;
        loop {
            steps += 1;
            self.contract_cycles();
            let Some(n) = self.work.pop_front() else { break };
            self.in_work.remove(&n);
            let n = self.rep(n);
            let delta = self.delta(n);
            if delta.is_empty() {
                continue;
            }

            // Plain copy propagation: flow every new label along every live
            // `copy` edge out of `n`.
            if let Some(targets) = self.edges.get(&n).cloned() {
                for t in targets {
                    self.add_labels(t, delta.iter().copied());
                }
            }

            if let Some(constraints) = self.complex.get(&n).cloned() {
                for c in constraints {
                    self.fire(&delta, c)?;
                }
            }

            if let Some(pending) = self.pending_container.get(&n).cloned() {
                for p in pending {
                    self.fire_pending_container(&delta, p);
                }
            }
        }
        log::info!(
            "solver: reached fixed point after {steps} worklist steps, {} object labels recorded",
            self.pts.values().map(|s| s.len()).sum::<usize>()
        );
        self.hooks.log(&format!("solve: fixed point at {steps} steps"));
        Ok(())
    }

    /// Finds strongly connected components of the current copy graph and
    /// unifies each non-trivial one into its lowest-numbered member,
    /// redirecting `pts`/`seen`/`complex`/`edges` to the representative
    /// (spec.md §4.5 "On-line cycle detection").
    fn contract_cycles(&mut self) {
        if self.graph_version == self.last_scc_version {
            return;
        }
        self.last_scc_version = self.graph_version;

        let mut g = DiGraph::<NodeId, ()>::new();
        let mut ix = HashMap::new();
        for (&src, dsts) in &self.edges {
            let si = *ix.entry(src).or_insert_with(|| g.add_node(src));
            for &dst in dsts {
                let di = *ix.entry(dst).or_insert_with(|| g.add_node(dst));
                g.add_edge(si, di, ());
            }
        }
        for scc in tarjan_scc(&g) {
            if scc.len() < 2 {
                continue;
            }
            let members: Vec<NodeId> = scc.iter().map(|&i| g[i]).collect();
            let rep = *members.iter().min_by_key(|n| n.0).unwrap();
            log::trace!("solver: unifying {}-node cycle into {rep}", members.len());
            for &m in &members {
                if m == rep {
                    continue;
                }
                self.merge(rep, m);
            }
        }
    }

    fn merge(&mut self, rep: NodeId, other: NodeId) {
        self.uf.union(rep.0, other.0);
        let rep = self.rep(rep);
        if let Some(set) = self.pts.remove(&other) {
            let changed = {
                let dst = self.pts.entry(rep).or_default();
                let before = dst.len();
                dst.extend(set);
                dst.len() != before
            };
            if changed {
                self.enqueue(rep);
            }
        }
        if let Some(seen) = self.seen.remove(&other) {
            self.seen.entry(rep).or_default().extend(seen);
        }
        if let Some(cs) = self.complex.remove(&other) {
            self.complex.entry(rep).or_default().extend(cs);
        }
        if let Some(ps) = self.pending_container.remove(&other) {
            self.pending_container.entry(rep).or_default().extend(ps);
        }
        if let Some(targets) = self.edges.remove(&other) {
            let list = self.edges.entry(rep).or_default();
            for t in targets {
                if !list.contains(&t) {
                    list.push(t);
                }
            }
        }
        for targets in self.edges.values_mut() {
            for t in targets.iter_mut() {
                if *t == other {
                    *t = rep;
                }
            }
        }
    }

    fn fire(&mut self, delta: &BTreeSet<NodeId>, c: Constraint) -> Result<(), AnalysisError> {
        match c {
            Constraint::Load { offset, dst, src: _ } => {
                for &o in delta {
                    self.add_copy_edge(o.offset(offset as usize), dst);
                }
            }
            Constraint::Store { offset, dst: _, src } => {
                for &o in delta {
                    self.add_copy_edge(src, o.offset(offset as usize));
                }
            }
            Constraint::OffsetAddr { offset, dst, src: _ } => {
                let labels: Vec<NodeId> = delta.iter().map(|o| o.offset(offset as usize)).collect();
                self.add_labels(dst, labels);
            }
            Constraint::TypeAssert { asserted_ty, dst, src: _, extracts_payload } => {
                for &o in delta {
                    if self.satisfies_assertion(o, &asserted_ty) {
                        let flowed = if extracts_payload { o.offset(1) } else { o };
                        self.add_copy_edge(flowed, dst);
                    }
                }
            }
            Constraint::Invoke { method_name, iface: _, block } => {
                for &o in delta {
                    self.resolve_invoke(&method_name, o, &block)?;
                }
            }
            Constraint::DynCall { closure: _, block } => {
                for &o in delta {
                    self.resolve_dyncall(o, &block);
                }
            }
            Constraint::Intrinsic(IntrinsicConstraint::TypeOf { dst, .. }) => {
                for &o in delta {
                    self.solve_type_of(o, dst);
                }
            }
            Constraint::Intrinsic(IntrinsicConstraint::ContainerAccess { op, dst, src, .. }) => {
                for &o in delta {
                    self.register_pending_container(o, op, dst, src);
                }
            }
            Constraint::Addr { .. }
            | Constraint::Copy { .. }
            | Constraint::Intrinsic(IntrinsicConstraint::ChanOf { .. })
            | Constraint::Intrinsic(IntrinsicConstraint::Elem { .. })
            | Constraint::Intrinsic(IntrinsicConstraint::Allocating { .. })
            | Constraint::Intrinsic(IntrinsicConstraint::Zero { .. }) => {
                // Addr/Copy never register as complex constraints; the
                // other four intrinsics are one-time facts solved at
                // install time (see `install_intrinsic`). Unreachable here.
            }
        }
        Ok(())
    }

    /// True if the dynamic type carried by tagged label `o` satisfies
    /// `asserted_ty`. Exact equality always satisfies; asserting against an
    /// interface type is treated as satisfied by any concrete type that has
    /// a recorded method set, since this crate's `Ty` does not carry enough
    /// structure to check individual method signatures (a documented
    /// simplification — see DESIGN.md).
    fn satisfies_assertion(&self, o: NodeId, asserted_ty: &Ty) -> bool {
        let dyn_ty = &self.nodes.get(o).ty;
        if dyn_ty == asserted_ty {
            return true;
        }
        matches!(asserted_ty, Ty::Basic(BasicKind::Interface)) && self.program.method_sets.contains_key(dyn_ty)
    }

    fn resolve_invoke(&mut self, method_name: &str, o: NodeId, block: &InvokeBlock) -> Result<(), AnalysisError> {
        let dyn_ty = self.nodes.get(o).ty.clone();
        let Some(callee) = self.program.lookup_method(&dyn_ty, method_name) else {
            self.warnings.push(Warning::new(
                block.call_pos.clone(),
                format!("no method `{method_name}` found on dynamic type reaching this interface call"),
            ));
            return Ok(());
        };
        // Always resolve to the function's shared contour, never a fresh
        // per-callsite clone: the generator pre-materializes (and generates
        // a body for) every method reachable through a `MakeInterface` under
        // `Key::Shared` before solving starts (`emit_make_interface`), and
        // the solver has no way to run `generate_contour_body` on a contour
        // allocated mid-solve. Passing the call site here would silently
        // allocate a bodiless clone for any per-callsite-eligible method.
        let (callee_cgn, _) = self.contours.get_or_create(&mut self.nodes, self.program, callee, None);
        self.wire_call(callee_cgn, block);
        let site = &self.call_sites[block.call_site.0 as usize];
        self.call_edges.push((site.caller, block.call_site, callee_cgn));
        Ok(())
    }

    fn resolve_dyncall(&mut self, o: NodeId, block: &InvokeBlock) {
        let Some(&callee_cgn) = self.cg_nodes_by_object.get(&ObjectId(o)) else {
            // Not a function object (e.g. a stray label with the same id
            // space); nothing callable here.
            return;
        };
        self.wire_call(callee_cgn, block);
        let site = &self.call_sites[block.call_site.0 as usize];
        self.call_edges.push((site.caller, block.call_site, callee_cgn));
    }

    fn wire_call(&mut self, callee_cgn: CgNodeId, block: &InvokeBlock) {
        let layout = self.contours.layout(callee_cgn).clone();
        let (param_types, result_types): (Vec<Ty>, Vec<Ty>) = match self.contours.function_of(callee_cgn) {
            Some(fid) => {
                let f = self.program.function(fid);
                (f.param_types.clone(), f.results.clone())
            }
            None => (Vec::new(), Vec::new()),
        };
        for i in 0..block.args.len().min(layout.params.len()) {
            let pty = param_types.get(i).cloned().unwrap_or(Ty::Invalid);
            self.wire_stepped_copy(&pty, layout.params[i], block.args[i]);
        }
        if let (Some(result), Some(&ret)) = (block.result, layout.results.first()) {
            let rty = result_types.first().cloned().unwrap_or(Ty::Invalid);
            self.wire_stepped_copy(&rty, result, ret);
        }
        self.add_label(block.targets, layout.identity);
    }

    /// Wires one `add_copy_edge` per scalar field of `ty`, mirroring
    /// `Generator::emit_stepped_copy` for the solver's own copy-edge graph.
    fn wire_stepped_copy(&mut self, ty: &Ty, dst: NodeId, src: NodeId) {
        for i in 0..crate::flatten::sizeof(ty) {
            self.add_copy_edge(src.offset(i), dst.offset(i));
        }
    }

    fn solve_type_of(&mut self, o: NodeId, dst: NodeId) {
        let dyn_ty = self.nodes.get(o).ty.clone();
        let type_obj = self.canonical_rtype(&dyn_ty);
        self.add_label(dst, type_obj.0);
    }

    /// Returns (creating on first demand) the canonical `*rtype`-tagged
    /// object for `ty` (spec.md §4.4 "`TypeOf(T)` always returns the
    /// canonical `*rtype` tagged object for `T`, created on first demand and
    /// cached").
    fn canonical_rtype(&mut self, ty: &Ty) -> ObjectId {
        if let Some(obj) = self.type_cache.get(ty) {
            return obj;
        }
        let head = self.nodes.add_one(ty.clone(), "rtype", None);
        let obj = self.nodes.end_object(
            head,
            None,
            AllocSite {
                description: format!("rtype({ty:?})"),
                function: "reflect".to_owned(),
            },
            ObjectFlags::TAGGED,
        );
        self.type_cache.insert(ty.clone(), obj);
        obj
    }

    fn solve_chan_of(&mut self, dir: Option<crate::ir::ChanDir>, elem_ty: &Ty, dst: NodeId) {
        use crate::ir::ChanDir;
        let dirs: Vec<Option<ChanDir>> = match dir {
            Some(d) => vec![Some(d)],
            None => vec![Some(ChanDir::SendRecv), Some(ChanDir::SendOnly), Some(ChanDir::RecvOnly)],
        };
        for d in dirs {
            let key = (d, elem_ty.clone());
            let obj = if let Some(obj) = self.chan_type_cache.get(&key) {
                *obj
            } else {
                let head = self.nodes.add_one(Ty::Basic(BasicKind::Chan), "chan-rtype", None);
                let obj = self.nodes.end_object(
                    head,
                    None,
                    AllocSite {
                        description: format!("chantype({elem_ty:?})"),
                        function: "reflect".to_owned(),
                    },
                    ObjectFlags::TAGGED,
                );
                self.chan_type_cache.insert(key, obj);
                obj
            };
            self.add_label(dst, obj.0);
        }
    }

    /// `(reflect.Type).Elem() -> Type`: the canonical `*rtype` tagged object
    /// for `elem_ty` (spec.md §8 scenario 4 "Reflection round-trip"). Like
    /// `TypeOf`, reuses `canonical_rtype` so two `Elem()` calls that name the
    /// same element type converge on one object.
    fn solve_elem(&mut self, elem_ty: &Ty, dst: NodeId) {
        let obj = self.canonical_rtype(elem_ty);
        self.add_label(dst, obj.0);
    }

    /// `reflect.MakeChan(t)` / `reflect.MakeMap(t)` / `reflect.New(t)`:
    /// allocates a fresh object of element type(s) and wraps its address in
    /// a tagged object (spec.md §4.4).
    ///
    /// `reflect.MakeMap`'s const-arg type is whatever the front-end attached
    /// to the `reflect.Type` value passed in, which for a genuine `map[K]V`
    /// literal this crate's `Ty` can only represent as a bare, key-less
    /// `Ty::Tuple([K, V])` — a front-end convention, not something this
    /// intrinsic can demand. When the front-end instead hands over the
    /// opaque `Ty::Basic(BasicKind::Map)` (the common case, since `Ty` has
    /// no structural map type), `key_size` stays `None` and container
    /// access folds key and value to the same slot, a sound but imprecise
    /// over-approximation (see DESIGN.md).
    fn solve_allocating(&mut self, kind: AllocatingIntrinsic, elem_ty: &Ty, dst: NodeId, call_site: &crate::ir::SourcePosition) {
        let (backing_ty, key_size, payload_basic) = match kind {
            AllocatingIntrinsic::MakeMap => match elem_ty {
                Ty::Tuple(parts) if parts.len() == 2 => {
                    (elem_ty.clone(), Some(crate::flatten::sizeof(&parts[0])), BasicKind::Map)
                }
                _ => (elem_ty.clone(), None, BasicKind::Map),
            },
            AllocatingIntrinsic::MakeChan => (elem_ty.clone(), None, BasicKind::Chan),
            AllocatingIntrinsic::New => (elem_ty.clone(), None, BasicKind::Pointer),
        };
        let backing_head = self.nodes.add_many(&backing_ty, "reflect-alloc");
        let backing_obj = self.nodes.end_object(
            backing_head,
            None,
            AllocSite {
                description: format!("reflectalloc@{call_site}"),
                function: "reflect".to_owned(),
            },
            ObjectFlags::empty(),
        );
        if let Some(ks) = key_size {
            self.nodes.set_key_size(backing_obj, ks);
        }

        let tagged_head = self.nodes.add_one(Ty::Basic(payload_basic), "reflect-alloc-tag", None);
        self.nodes.add_one(Ty::Basic(BasicKind::Pointer), "reflect-alloc-payload", None);
        let tagged_obj = self.nodes.end_object(
            tagged_head,
            None,
            AllocSite {
                description: format!("reflectallocwrapper@{call_site}"),
                function: "reflect".to_owned(),
            },
            ObjectFlags::TAGGED | ObjectFlags::INDIRECT,
        );
        self.add_label(tagged_head.offset(1), backing_obj.0);
        self.add_label(dst, tagged_obj.0);
    }

    /// `reflect.Zero(t)`: deliberately **not** memoized (spec.md §9 Open
    /// Question — "It is unclear whether this is an intentional soundness
    /// fix or a debugging remnant; implementers should preserve the
    /// uncached behavior"). Every call allocates its own fresh zero-value
    /// object, even for a repeated `t` at the same call site.
    fn solve_zero(&mut self, ty: &Ty, dst: NodeId, call_site: &crate::ir::SourcePosition) {
        let payload_head = self.nodes.add_many(ty, "zero-payload");
        let head = self.nodes.add_one(ty.clone(), "zero-tag", None);
        if payload_head.is_sentinel() {
            // `ty` carries no pointer-like content; still hand back a
            // distinct tagged wrapper so `Zero` remains a meaningful value.
        }
        let obj = self.nodes.end_object(
            head,
            None,
            AllocSite {
                description: format!("zero({ty:?})@{call_site}"),
                function: "reflect".to_owned(),
            },
            ObjectFlags::TAGGED,
        );
        if !payload_head.is_sentinel() {
            self.add_copy_edge(payload_head, head.offset(1));
        }
        self.add_label(dst, obj.0);
    }

    /// First sighting of a tagged label `o` flowing into a container-access
    /// reflection call. `(Value).Interface()` wants the raw payload
    /// immediately; every other op needs a second level of indirection
    /// (waiting on what `o`'s payload slot itself points to) before it
    /// knows which map/chan object to load/store against.
    fn register_pending_container(&mut self, o: NodeId, op: ContainerOp, dst: Option<NodeId>, src: Option<NodeId>) {
        if op == ContainerOp::Interface {
            if let Some(dst) = dst {
                self.add_copy_edge(o.offset(1), dst);
            }
            return;
        }
        let trigger = self.rep(o.offset(1));
        self.pending_container.entry(trigger).or_default().push(PendingContainer { op, dst, src });
    }

    fn fire_pending_container(&mut self, delta: &BTreeSet<NodeId>, p: PendingContainer) {
        for &m in delta {
            let key_size = self.nodes.header_of(ObjectId(m)).and_then(|h| h.key_size);
            match p.op {
                ContainerOp::MapIndex => {
                    if let Some(dst) = p.dst {
                        self.add_copy_edge(m.offset(key_size.unwrap_or(0)), dst);
                    }
                }
                ContainerOp::MapKeys => {
                    if let Some(dst) = p.dst {
                        self.add_copy_edge(m.offset(0), dst);
                    }
                }
                ContainerOp::Recv => {
                    if let Some(dst) = p.dst {
                        self.add_copy_edge(m.offset(0), dst);
                    }
                }
                ContainerOp::Send => {
                    if let Some(src) = p.src {
                        self.add_copy_edge(src, m.offset(0));
                    }
                }
                ContainerOp::SetMapIndex => {
                    if let Some(src) = p.src {
                        self.add_copy_edge(src, m.offset(key_size.unwrap_or(0)));
                    }
                }
                ContainerOp::Interface => unreachable!("handled without deferral"),
            }
        }
    }
}
