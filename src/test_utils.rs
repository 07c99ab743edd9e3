//! Fixture helpers shared by this crate's own tests and by `src/bin/pta.rs`
//! integration tests (`tests/`). Grounded on the teacher's `crate::test_utils`
//! (`util.rs`'s doc-tests reference `open_test_file`): a couple of small
//! builders over `ir::ProgramBuilder` plus a `tempfile`-backed JSON
//! round-trip helper for exercising the driver binary's on-disk config/
//! program format without touching the real filesystem outside a temp dir.

use std::io::Write;

use crate::config::Config;
use crate::flatten::{BasicKind, Ty};
use crate::ir::{BasicBlock, BlockId, Function, FunctionId, Instr, Program, SourcePosition, ValueId};

pub fn pos(file: &str, line: u32) -> SourcePosition {
    SourcePosition { file: file.to_owned(), line }
}

/// A single-function, single-block program wired as `name() { <instrs> }`,
/// with `name` registered as an entry point — the common shape of this
/// crate's own unit tests and the scenarios in spec.md §8.
pub fn single_block_program(name: &str, instrs: Vec<Instr>) -> Program {
    let mut prog = Program::default();
    let func = Function {
        id: FunctionId(0),
        name: name.to_owned(),
        signature: Ty::Invalid,
        params: vec![],
        param_types: vec![],
        results: vec![],
        blocks: vec![BasicBlock { id: BlockId(0), instrs }],
        pos: pos(name, 1),
        is_synthetic_wrapper: false,
    };
    prog.functions.push(func);
    prog.entry_points.push(FunctionId(0));
    prog
}

/// Appends a second, freestanding function (no params/results beyond what
/// the caller wires through `StaticCall`/`Invoke` args) reachable only by
/// being called from a function already in `prog`. Returns its `FunctionId`.
pub fn add_function(
    prog: &mut Program,
    name: &str,
    param_types: Vec<Ty>,
    params: Vec<ValueId>,
    results: Vec<Ty>,
    instrs: Vec<Instr>,
) -> FunctionId {
    let id = FunctionId(prog.functions.len() as u32);
    prog.functions.push(Function {
        id,
        name: name.to_owned(),
        signature: Ty::Invalid,
        params,
        param_types,
        results,
        blocks: vec![BasicBlock { id: BlockId(0), instrs }],
        pos: pos(name, 1),
        is_synthetic_wrapper: false,
    });
    id
}

pub fn ptr_ty() -> Ty {
    Ty::Basic(BasicKind::Pointer)
}

/// Config requesting an empty set of entry packages is invalid, so tests
/// that only care about program shape use this: one entry package whose
/// name matches every program built by `single_block_program`/`add_function`
/// above (entry points are additionally seeded directly via
/// `Program::entry_points`, so the package-name match is redundant but
/// harmless for those programs).
pub fn config_with_entry(entry_package: &str) -> Config {
    Config {
        entry_packages: vec![entry_package.to_owned()],
        queries: Default::default(),
    }
}

/// Serializes `program`/`config` to a temp-directory JSON pair and returns
/// their paths, mirroring the on-disk shape `src/bin/pta.rs` reads. The
/// temp directory is returned too so it isn't dropped (and deleted) before
/// the caller is done with the paths.
pub fn write_fixture_files(
    program: &Program,
    config: &Config,
) -> std::io::Result<(tempfile::TempDir, std::path::PathBuf, std::path::PathBuf)> {
    let dir = tempfile::tempdir()?;
    let program_path = dir.path().join("program.json");
    let config_path = dir.path().join("config.json");
    let mut f = std::fs::File::create(&program_path)?;
    f.write_all(serde_json::to_string_pretty(program)?.as_bytes())?;
    let mut f = std::fs::File::create(&config_path)?;
    f.write_all(serde_json::to_string_pretty(config)?.as_bytes())?;
    Ok((dir, program_path, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Instr;

    #[test]
    fn fixture_files_round_trip_through_json() {
        let prog = single_block_program(
            "main",
            vec![Instr::Return { results: vec![] }],
        );
        let cfg = config_with_entry("main");
        let (_dir, program_path, config_path) = write_fixture_files(&prog, &cfg).unwrap();

        let read_prog: Program = serde_json::from_reader(std::fs::File::open(&program_path).unwrap()).unwrap();
        let read_cfg: Config = serde_json::from_reader(std::fs::File::open(&config_path).unwrap()).unwrap();
        assert_eq!(read_prog.functions.len(), 1);
        assert_eq!(read_cfg.entry_packages, vec!["main".to_owned()]);
    }
}
