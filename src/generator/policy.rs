//! Context-sensitivity policy (spec.md §4.4): decides whether a function
//! gets one shared contour or a fresh contour per call site. A heuristic
//! with documented cutoffs so test suites can reproduce them, per spec.md
//! §4.4's closing note.

use crate::ir::{Function, Instr};

/// Functions with at most this many instructions in their single block are
/// eligible for per-callsite cloning under clause (c).
pub const SIMPLE_FUNCTION_MAX_INSTRS: usize = 10;

/// Whether `f` is cloned per call site (`true`) or given one shared
/// contour (`false`).
///
/// - (a) intrinsics are always cloned per call site — handled by the
///   caller before this function is even consulted, since intrinsics never
///   have an `ir::Function` body to inspect.
/// - (b) synthetic wrappers (bound-method/interface-method shims) are
///   always cloned per call site.
/// - (c) otherwise, a single-block function with <= 10 instructions and no
///   non-builtin calls is cloned per call site; everything else shares one
///   contour.
pub fn is_per_callsite(f: &Function) -> bool {
    if f.is_synthetic_wrapper {
        return true;
    }
    is_short_and_simple(f)
}

fn is_short_and_simple(f: &Function) -> bool {
    if f.blocks.len() != 1 {
        return false;
    }
    let blk = &f.blocks[0];
    if blk.instrs.len() > SIMPLE_FUNCTION_MAX_INSTRS {
        return false;
    }
    !blk.instrs.iter().any(is_non_builtin_call)
}

fn is_non_builtin_call(i: &Instr) -> bool {
    matches!(
        i,
        Instr::Invoke { .. } | Instr::StaticCall { .. } | Instr::ClosureCall { .. }
    )
}
