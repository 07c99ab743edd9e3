//! Solver throughput benchmarks: a linear alias chain (worst case for naive
//! copy propagation without cycle detection) and a self-recursive call
//! chain (exercises contour memoization under the context-sensitivity
//! policy, spec.md §4.4).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use pointer_analysis::config::{Config, Hooks};
use pointer_analysis::flatten::{BasicKind, Ty};
use pointer_analysis::ir::{BasicBlock, BlockId, Function, FunctionId, Instr, Program, SourcePosition, ValueId};
use pointer_analysis::{generator, solver};

fn pos() -> SourcePosition {
    SourcePosition { file: "bench.go".into(), line: 1 }
}

/// `a0 := new(int); a1 := a0; a2 := a1; ...; aN := aN-1`, forcing the solver
/// to flow one label down a chain of `n` copy edges.
fn alias_chain_program(n: usize) -> Program {
    let mut instrs = vec![Instr::Alloc {
        dst: ValueId(0),
        ty: Ty::Basic(BasicKind::Pointer),
        pos: pos(),
    }];
    for i in 1..n {
        instrs.push(Instr::ChangeType {
            dst: ValueId(i as u32),
            src: ValueId((i - 1) as u32),
        });
    }
    instrs.push(Instr::Return { results: vec![] });

    let mut prog = Program::default();
    prog.functions.push(Function {
        id: FunctionId(0),
        name: "main".into(),
        signature: Ty::Invalid,
        params: vec![],
        param_types: vec![],
        results: vec![],
        blocks: vec![BasicBlock { id: BlockId(0), instrs }],
        pos: pos(),
        is_synthetic_wrapper: false,
    });
    prog.entry_points.push(FunctionId(0));
    prog
}

/// `f0` calls `f1` calls `f2` ... calls `fN`, each a single-block, >10
/// instruction function (so each gets one shared contour, not N clones),
/// passing a pointer argument straight through.
fn call_chain_program(n: usize) -> Program {
    let mut prog = Program::default();
    for i in 0..n {
        let is_last = i + 1 == n;
        let mut instrs = Vec::new();
        // Padding instructions keep each function over the per-callsite
        // cloning threshold (spec.md §4.4 clause c), so the chain exercises
        // the shared-contour path rather than allocating N*N clones.
        for j in 0..12u32 {
            instrs.push(Instr::NoEffectBuiltin { dst: None });
            let _ = j;
        }
        if is_last {
            instrs.push(Instr::Return { results: vec![ValueId(0)] });
        } else {
            instrs.push(Instr::StaticCall {
                dst: Some(ValueId(1)),
                result_ty: Ty::Basic(BasicKind::Pointer),
                callee: FunctionId((i + 1) as u32),
                args: vec![ValueId(0)],
                pos: pos(),
            });
            instrs.push(Instr::Return { results: vec![ValueId(1)] });
        }
        prog.functions.push(Function {
            id: FunctionId(i as u32),
            name: format!("f{i}"),
            signature: Ty::Invalid,
            params: vec![ValueId(0)],
            param_types: vec![Ty::Basic(BasicKind::Pointer)],
            results: vec![Ty::Basic(BasicKind::Pointer)],
            blocks: vec![BasicBlock { id: BlockId(0), instrs }],
            pos: pos(),
            is_synthetic_wrapper: false,
        });
    }
    prog.entry_points.push(FunctionId(0));
    prog
}

fn bench_alias_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("alias_chain");
    for &n in &[16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let prog = alias_chain_program(n);
                let cfg = Config {
                    entry_packages: vec!["main".into()],
                    queries: Default::default(),
                };
                let hooks = Hooks::none();
                let gen = generator::generate(&prog, &cfg, &hooks).unwrap();
                solver::solve(&prog, gen, &hooks).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_call_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("call_chain");
    for &n in &[8usize, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let prog = call_chain_program(n);
                let cfg = Config {
                    entry_packages: vec!["f0".into()],
                    queries: Default::default(),
                };
                let hooks = Hooks::none();
                let gen = generator::generate(&prog, &cfg, &hooks).unwrap();
                solver::solve(&prog, gen, &hooks).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_alias_chain, bench_call_chain);
criterion_main!(benches);
