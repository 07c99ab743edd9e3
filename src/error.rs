//! Error handling (spec.md §7): a structured library-level error enum.
//! Library entry points (`lib::analyze`, `generator::generate`,
//! `solver::solve`) return `Result<T, AnalysisError>` directly; `anyhow`
//! is only layered in at the CLI binary boundary (`src/bin/pta.rs`),
//! matching the teacher's split between its `util.rs` library functions
//! and `json_to_constraints.rs`'s `main`.

use thiserror::Error;

use crate::ids::NodeId;
use crate::ir::SourcePosition;

/// Fatal error kinds (spec.md §7). Non-fatal "unsoundness warnings" are
/// `Warning`, not `AnalysisError` — they are collected, not raised.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No entry point, duplicate entry package, or a malformed query.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An ill-typed constraint or other state a correct generator/solver
    /// should never produce: a bug in the core, not in client input.
    #[error("internal invariant violation at {node:?}: {detail}")]
    InternalInvariant {
        detail: String,
        node: Option<NodeId>,
    },

    /// The SSA shape is outside the supported subset (spec.md §7 "Unknown
    /// builtin / instruction form").
    #[error("unsupported instruction form: {detail}")]
    UnsupportedForm { detail: String },
}

impl AnalysisError {
    pub fn invariant(detail: impl Into<String>) -> AnalysisError {
        AnalysisError::InternalInvariant {
            detail: detail.into(),
            node: None,
        }
    }

    pub fn invariant_at(detail: impl Into<String>, node: NodeId) -> AnalysisError {
        AnalysisError::InternalInvariant {
            detail: detail.into(),
            node: Some(node),
        }
    }
}

/// A non-fatal unsoundness warning (spec.md §7): emitted to the warning
/// list and logged; analysis continues.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    pub pos: SourcePosition,
    pub message: String,
}

impl Warning {
    pub fn new(pos: SourcePosition, message: impl Into<String>) -> Warning {
        Warning {
            pos,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}
