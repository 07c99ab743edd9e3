//! Contour (function-object) allocation, factored out of the generator so
//! the solver can materialize newly-discovered callees during `invoke`
//! resolution (spec.md §4.5) without duplicating the node/object layout
//! rules. Both `Generator` and `crate::solver::Solver` hold their own copy
//! of the `ContourTable` this module operates on.

use indexmap::IndexMap;

use crate::ids::{AllocSite, NodeTable, ObjectFlags};
use crate::ir::{FunctionId, Program};

use super::policy;
use super::{CallSiteId, CgNode, CgNodeId, ContourLayout};

/// The mutable call-graph state shared by generation and solving: cgns,
/// their layouts, and the two memoization tables keyed by function
/// identity / call-site identity (spec.md §8 "Contour determinism").
///
/// The three maps are `IndexMap` rather than `HashMap` so a contour's
/// discovery order (the RTA worklist order spec.md §4.4 describes) is
/// still recoverable by iterating them, the way the generator's `cg_nodes`
/// vector already preserves it for the call-graph itself — useful for any
/// future diagnostic dump of contour memoization, and a property a plain
/// `HashMap` would silently discard.
#[derive(Default)]
pub struct ContourTable {
    pub cg_nodes: Vec<CgNode>,
    pub layouts: IndexMap<CgNodeId, ContourLayout>,
    shared: IndexMap<FunctionId, CgNodeId>,
    per_site: IndexMap<(FunctionId, CallSiteId), CgNodeId>,
}

impl ContourTable {
    pub fn new() -> ContourTable {
        ContourTable::default()
    }

    pub fn layout(&self, cgn: CgNodeId) -> &ContourLayout {
        &self.layouts[&cgn]
    }

    pub fn function_of(&self, cgn: CgNodeId) -> Option<FunctionId> {
        self.cg_nodes[cgn.0 as usize].function
    }

    /// Returns the existing contour for `func_id` under the policy-chosen
    /// key, or allocates a fresh one (and its node-table block) if this is
    /// the first time it is seen. Returns `(cgn, is_new)`; `is_new` tells
    /// the caller whether to enqueue the body for generation.
    pub fn get_or_create(
        &mut self,
        nodes: &mut NodeTable,
        program: &Program,
        func_id: FunctionId,
        caller_site: Option<CallSiteId>,
    ) -> (CgNodeId, bool) {
        let func = program.function(func_id);
        let key = if policy::is_per_callsite(func) {
            caller_site.map_or(Key::Shared(func_id), |s| Key::PerSite(func_id, s))
        } else {
            Key::Shared(func_id)
        };

        if let Some(existing) = self.lookup(key) {
            return (existing, false);
        }

        let head = nodes.next_id();
        let cgn = CgNodeId(self.cg_nodes.len() as u32);
        self.cg_nodes.push(CgNode {
            function: Some(func_id),
            object: crate::ids::ObjectId(head),
            caller_site,
        });
        self.remember(key, cgn);

        nodes.add_one(func.signature.clone(), format!("{}:identity", func.name), None);
        let params = func
            .param_types
            .iter()
            .map(|t| nodes.add_many(t, format!("{}:param", func.name)))
            .collect();
        let results = func
            .results
            .iter()
            .map(|t| nodes.add_many(t, format!("{}:result", func.name)))
            .collect();

        let obj = nodes.end_object(
            head,
            Some(cgn),
            AllocSite {
                description: func.name.clone(),
                function: func.name.clone(),
            },
            ObjectFlags::FUNCTION,
        );
        self.cg_nodes[cgn.0 as usize].object = obj;
        self.layouts.insert(cgn, ContourLayout { identity: head, params, results });
        (cgn, true)
    }

    fn lookup(&self, key: Key) -> Option<CgNodeId> {
        match key {
            Key::Shared(f) => self.shared.get(&f).copied(),
            Key::PerSite(f, s) => self.per_site.get(&(f, s)).copied(),
        }
    }

    fn remember(&mut self, key: Key, cgn: CgNodeId) {
        match key {
            Key::Shared(f) => {
                self.shared.insert(f, cgn);
            }
            Key::PerSite(f, s) => {
                self.per_site.insert((f, s), cgn);
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Shared(FunctionId),
    PerSite(FunctionId, CallSiteId),
}
