//! Whole-program, inclusion-based, context-sensitive, field-sensitive
//! points-to analysis over a typed SSA intermediate representation
//! (spec.md §1). Consumes a `ir::Program` plus a `config::Config`, and
//! produces a `result::AnalysisResult`: a sound call graph, per-query
//! points-to answers, and a list of unsoundness warnings.
//!
//! Parsing, type-checking, and SSA construction are external collaborators
//! and out of scope; this crate starts from already-built typed SSA.

pub mod config;
pub mod constraints;
pub mod error;
pub mod flatten;
pub mod generator;
pub mod ids;
pub mod intrinsics;
pub mod ir;
pub mod result;
pub mod solver;

#[cfg(test)]
pub mod test_utils;

use config::{Config, Hooks};
use error::AnalysisError;
use ir::Program;
use result::AnalysisResult;

/// Runs the full pipeline — constraint generation, solving, and result
/// translation — over `program` under `config` (spec.md §2 "Data flow: SSA +
/// config → generator → solver → result API").
pub fn analyze(program: &Program, config: &Config, hooks: &Hooks) -> Result<AnalysisResult, AnalysisError> {
    let gen = generator::generate(program, config, hooks)?;
    let solved = solver::solve(program, gen, hooks)?;
    Ok(result::build(&solved, config))
}
