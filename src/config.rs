//! Configuration (spec.md §3). `Config` is the serializable half (entry
//! packages and queries travel through JSON the way the teacher's
//! `pointer_inference::Config` is built from literal Rust in
//! `json_to_constraints.rs`); `Hooks` carries the two callback fields that
//! cannot round-trip through serde.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value the client wants the final points-to set of, identified by its
/// defining function and SSA value id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    pub function: crate::ir::FunctionId,
    pub value: crate::ir::ValueId,
}

/// Recognized configuration options (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ordered; the first duplicate entry package is a configuration error.
    pub entry_packages: Vec<String>,
    /// Maps a queried value to whether the client wants the indirect
    /// (dereferenced) points-to set rather than the direct one.
    pub queries: BTreeMap<QueryKey, bool>,
}

impl Config {
    /// Validates the configuration per spec.md §7 "Configuration error".
    pub fn validate(&self) -> Result<(), crate::error::AnalysisError> {
        if self.entry_packages.is_empty() {
            return Err(crate::error::AnalysisError::Configuration(
                "no entry point specified".to_owned(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for pkg in &self.entry_packages {
            if !seen.insert(pkg) {
                return Err(crate::error::AnalysisError::Configuration(format!(
                    "duplicate entry package: {pkg}"
                )));
            }
        }
        Ok(())
    }
}

/// Client-supplied callbacks that cannot be serialized: the print-probe
/// hook and an optional debug trace sink (spec.md §3).
#[derive(Default, Clone)]
pub struct Hooks {
    /// Invoked once per distinct print-probe call site (spec.md §4.4
    /// "print/println"), with the probe's queryable node id.
    pub print_hook: Option<std::rc::Rc<dyn Fn(crate::ids::NodeId)>>,
    /// Optional debug trace stream, generalizing the teacher's
    /// `FileDebugLogger` (`util.rs`) from "log to a file" to "log to an
    /// arbitrary sink closure".
    pub log_sink: Option<std::rc::Rc<dyn Fn(&str)>>,
}

impl Hooks {
    pub fn none() -> Hooks {
        Hooks::default()
    }

    pub fn fire_print(&self, probe: crate::ids::NodeId) {
        if let Some(f) = &self.print_hook {
            f(probe);
        }
    }

    pub fn log(&self, line: &str) {
        if let Some(f) = &self.log_sink {
            f(line);
        }
    }
}
