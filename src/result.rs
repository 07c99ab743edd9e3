//! Translates solved solver state into the client-visible output bundle
//! (spec.md §4.6/§6): points-to answers per configured query, the call
//! graph, and the collected warnings. Grounded on the shape of the
//! teacher's `node_context::points_to::run_analysis` (solver state in,
//! `HashMap<NodeIndex, _>`-keyed client view out) generalized from a single
//! `PointsToContext` per CFG node to one `Label` set per queried value.

use std::collections::BTreeMap;

use crate::config::{Config, QueryKey};
use crate::error::Warning;
use crate::generator::{CallSiteId, CgNodeId};
use crate::ids::{AllocSite, ObjectId};
use crate::ir::{FunctionId, Program};
use crate::solver::SolveResult;

/// One allocation site a points-to set may name (spec.md §6 "Label
/// format"). Equality and ordering are by underlying object id only — the
/// rest is display metadata, not identity (spec.md §6 "Labels are
/// comparable by equality of underlying object id").
#[derive(Debug, Clone)]
pub struct Label {
    pub object: ObjectId,
    pub site: AllocSite,
    /// The contour that performed this allocation, if the creating cgn is
    /// context-sensitive (`None` for the handful of objects with no owning
    /// contour, e.g. the root cgn's own identity object).
    pub cgn: Option<CgNodeId>,
}

impl Label {
    /// A human-readable path, e.g. `alloc@file:line` (spec.md §6: "... a
    /// human-readable path (e.g., `alloc@file:line.f[0].g`)"). Per-field
    /// suffixes are only meaningful once a query resolves down to a single
    /// flattened field; at the whole-object granularity this API answers
    /// queries at, the site description alone is the path.
    pub fn path(&self) -> &str {
        &self.site.description
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}
impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Label {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.object.cmp(&other.object)
    }
}

impl std::hash::Hash for Label {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.object.hash(state);
    }
}

/// One resolved call-graph edge (spec.md §6 "`call_graph`: set of
/// `(caller, site, callee)` edges").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallGraphEdge {
    pub caller: CgNodeId,
    pub site: CallSiteId,
    pub callee: CgNodeId,
}

/// The answer to one configured query (spec.md §3 `QueryKey`): the queried
/// value's resolved label set, deduplicated by object id.
#[derive(Debug, Clone, Default)]
pub struct QueryAnswer {
    pub labels: Vec<Label>,
}

/// The final output bundle (spec.md §6 "Output bundle").
#[derive(Debug)]
pub struct AnalysisResult {
    pub call_graph: Vec<CallGraphEdge>,
    pub queries: BTreeMap<QueryKey, QueryAnswer>,
    pub warnings: Vec<Warning>,
}

/// Builds the full output bundle from solved state (spec.md §4.6
/// "Result API").
pub fn build(solved: &SolveResult, config: &Config) -> AnalysisResult {
    AnalysisResult {
        call_graph: build_call_graph(solved),
        queries: answer_queries(solved, config),
        warnings: solved.warnings.clone(),
    }
}

fn build_call_graph(solved: &SolveResult) -> Vec<CallGraphEdge> {
    solved
        .call_edges
        .iter()
        .map(|&(caller, site, callee)| CallGraphEdge { caller, site, callee })
        .collect()
}

fn answer_queries(solved: &SolveResult, config: &Config) -> BTreeMap<QueryKey, QueryAnswer> {
    config
        .queries
        .iter()
        .map(|(key, &indirect)| (key.clone(), answer_one(solved, key, indirect)))
        .collect()
}

/// Combines the points-to sets of every recorded node id for `key`'s value
/// across all contexts (spec.md §4.6 "combine the points-to sets of all its
/// recorded node ids across contexts"), translating object ids back into
/// labels. `indirect` additionally follows one more pointer hop: the
/// objects reachable by loading through each direct label, the way a real
/// `*v` dereference would (spec.md §4.6 "... or all dereferenced-indirect
/// queries").
fn answer_one(solved: &SolveResult, key: &QueryKey, indirect: bool) -> QueryAnswer {
    let Some(nodes) = solved.value_nodes.get(&(key.function, key.value)) else {
        return QueryAnswer::default();
    };

    let mut objects = std::collections::BTreeSet::new();
    for &n in nodes {
        objects.extend(solved.points_to(n));
    }

    if indirect {
        let direct = objects.clone();
        for obj in direct {
            objects.extend(solved.points_to(obj));
        }
    }

    let mut labels: Vec<Label> = objects
        .into_iter()
        .filter_map(|n| {
            let obj = ObjectId(n);
            solved.nodes.header_of(obj).map(|h| Label {
                object: obj,
                site: h.data.clone(),
                cgn: h.cgn,
            })
        })
        .collect();
    labels.sort();
    QueryAnswer { labels }
}

/// Resolves a call-graph edge's endpoints back to human-readable function
/// names, for diagnostics (spec.md §6 edges are "identified by cgn").
pub fn describe_edge(program: &Program, solved: &SolveResult, edge: &CallGraphEdge) -> (String, String) {
    let name = |cgn: CgNodeId| -> String {
        solved
            .cg_nodes
            .get(cgn.0 as usize)
            .and_then(|n| n.function)
            .map(|f: FunctionId| program.function(f).name.clone())
            .unwrap_or_else(|| "<root>".to_owned())
    };
    (name(edge.caller), name(edge.callee))
}
