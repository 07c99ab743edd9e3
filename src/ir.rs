//! The typed-SSA surface this crate consumes. Source-text parsing, the
//! type-checker, and SSA construction/optimization (dominators, φ-node
//! lifting) are all external collaborators and explicitly out of scope
//! (spec.md §1) — this module only defines the shape of their *output*
//! that the generator (`crate::generator`) pattern-matches on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flatten::Ty;

/// A position in the original source, carried through for diagnostics and
/// label formatting (spec.md §6 "Label format").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub file: String,
    pub line: u32,
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// A named, fully-qualified method on a type, as recorded in a value's
/// method set (used by `invoke` resolution and reflection intrinsics).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId {
    pub receiver_type: Ty,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub signature: Ty,
    pub params: Vec<ValueId>,
    pub param_types: Vec<Ty>,
    pub results: Vec<Ty>,
    pub blocks: Vec<BasicBlock>,
    pub pos: SourcePosition,
    /// True for functions synthesized by SSA building itself (bound-method
    /// and interface-method shims); these always get per-callsite contours
    /// (spec.md §4.4 context-sensitivity policy, clause b).
    pub is_synthetic_wrapper: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instrs: Vec<Instr>,
}

/// One SSA instruction. Each variant that produces a value carries its own
/// `dst`; control-flow-only forms (`Jump`, `Branch`) are no-ops for
/// constraint generation (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    Alloc {
        dst: ValueId,
        ty: Ty,
        pos: SourcePosition,
    },
    MakeSlice {
        dst: ValueId,
        elem_ty: Ty,
        pos: SourcePosition,
    },
    MakeChan {
        dst: ValueId,
        elem_ty: Ty,
        pos: SourcePosition,
    },
    MakeMap {
        dst: ValueId,
        key_ty: Ty,
        val_ty: Ty,
        pos: SourcePosition,
    },
    MakeInterface {
        dst: ValueId,
        src: ValueId,
        dynamic_ty: Ty,
        pos: SourcePosition,
    },
    Load {
        dst: ValueId,
        addr: ValueId,
        ty: Ty,
    },
    Store {
        addr: ValueId,
        value: ValueId,
        ty: Ty,
    },
    Send {
        chan: ValueId,
        value: ValueId,
    },
    Recv {
        dst: ValueId,
        chan: ValueId,
    },
    FieldAddr {
        dst: ValueId,
        base: ValueId,
        struct_ty: Ty,
        field_index: usize,
    },
    IndexAddr {
        dst: ValueId,
        base: ValueId,
    },
    FieldRead {
        dst: ValueId,
        base: ValueId,
        struct_ty: Ty,
        field_index: usize,
    },
    MapUpdate {
        map: ValueId,
        key: ValueId,
        value: ValueId,
        key_ty: Ty,
        val_ty: Ty,
    },
    MapLookup {
        dst: ValueId,
        map: ValueId,
        key: ValueId,
        key_ty: Ty,
        val_ty: Ty,
    },
    MapRange {
        dst: ValueId,
        iter_map: ValueId,
        key_ty: Ty,
        val_ty: Ty,
    },
    TypeAssert {
        dst: ValueId,
        src: ValueId,
        asserted_ty: Ty,
        /// true for `v, ok := x.(T)` which flows the payload; false for a
        /// plain type coercion which flows the tagged label itself.
        extracts_payload: bool,
    },
    Invoke {
        dst: Option<ValueId>,
        result_ty: Ty,
        iface: ValueId,
        method: MethodId,
        args: Vec<ValueId>,
        pos: SourcePosition,
    },
    StaticCall {
        dst: Option<ValueId>,
        result_ty: Ty,
        callee: FunctionId,
        args: Vec<ValueId>,
        pos: SourcePosition,
    },
    /// Takes a function's identity as a first-class value (a bound method
    /// value or a plain function reference assigned to a variable, passed
    /// as an argument, or stored in a struct). The sole producer of
    /// function-typed values that `ClosureCall` and `invoke`-free dynamic
    /// dispatch can flow through.
    FuncValue {
        dst: ValueId,
        func: FunctionId,
    },
    ClosureCall {
        dst: Option<ValueId>,
        result_ty: Ty,
        closure: ValueId,
        args: Vec<ValueId>,
        pos: SourcePosition,
    },
    ChangeInterface {
        dst: ValueId,
        src: ValueId,
    },
    ChangeType {
        dst: ValueId,
        src: ValueId,
    },
    Phi {
        dst: ValueId,
        edges: Vec<ValueId>,
    },
    Select {
        dst: ValueId,
        cond: ValueId,
        t: ValueId,
        f: ValueId,
    },
    Return {
        results: Vec<ValueId>,
    },
    Append {
        dst: ValueId,
        slice: ValueId,
        /// `None` for the single-argument `append(x)` form, which emits no
        /// allocation (spec.md §4.4 built-ins rules).
        elem: Option<ValueId>,
        elem_ty: Ty,
        pos: SourcePosition,
    },
    BuiltinCopy {
        dst: ValueId,
        src: ValueId,
        elem_ty: Ty,
    },
    Panic {
        value: ValueId,
    },
    Recover {
        dst: Option<ValueId>,
        result_ty: Ty,
    },
    Print {
        args: Vec<ValueId>,
        pos: SourcePosition,
    },
    /// `len`, `cap`, `real`, `imag`, `complex`, `close`, `delete`: no effect
    /// on points-to (spec.md §4.4 built-ins rules).
    NoEffectBuiltin {
        dst: Option<ValueId>,
    },
    /// A call to a standard-library function/method recognized by fully
    /// qualified name; the generator substitutes an intrinsic generator
    /// instead of following normal call-instruction rules.
    IntrinsicCall {
        dst: Option<ValueId>,
        qualified_name: String,
        args: Vec<ValueId>,
        /// Present when a direction/type argument is a compile-time
        /// constant at this callsite (e.g. `reflect.ChanOf`'s direction).
        const_args: BTreeMap<usize, ConstArg>,
        pos: SourcePosition,
    },
    /// An unsafe/unchecked pointer conversion. Spec.md §4.4 "Unsafe pointer
    /// conversions are treated as fresh allocations ... and a warning is
    /// issued unless the source is in an allow-listed low-level package."
    UnsafeConvert {
        dst: ValueId,
        src: ValueId,
        dest_pointee_ty: Ty,
        source_package: String,
        pos: SourcePosition,
    },
    Jump {
        target: BlockId,
    },
    Branch {
        cond: ValueId,
        t: BlockId,
        f: BlockId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstArg {
    ChanDir(ChanDir),
    Type(Ty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChanDir {
    SendRecv,
    SendOnly,
    RecvOnly,
}

/// The value produced by an instruction, typed so the generator can decide
/// whether it needs a value-node at all (spec.md §4.4: "Creates a
/// value-node per SSA value whose type contains pointers").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDef {
    pub id: ValueId,
    pub ty: Ty,
}

/// A whole program: the functions reachable-or-not, the program's type
/// universe's method sets (for `invoke` resolution), and extern/entry
/// declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
    /// Maps a type to the methods it implements, used to resolve `invoke`
    /// constraints against a dynamic type (spec.md §4.5 "Invoke
    /// resolution").
    pub method_sets: BTreeMap<Ty, Vec<MethodId>>,
    /// Maps a `MethodId` to the concrete function implementing it.
    pub method_impls: BTreeMap<MethodId, FunctionId>,
    pub entry_points: Vec<FunctionId>,
}

impl Program {
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn lookup_method(&self, receiver_ty: &Ty, name: &str) -> Option<FunctionId> {
        self.method_sets.get(receiver_ty)?.iter().find(|m| m.name == name).and_then(|m| {
            self.method_impls
                .get(&MethodId {
                    receiver_type: receiver_ty.clone(),
                    name: name.to_owned(),
                })
                .copied()
        })
    }
}

/// Builder used by `test_utils` and by real front-ends to assemble a
/// `Program` incrementally without hand-indexing `FunctionId`s.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn add_function(
        &mut self,
        name: &str,
        signature: Ty,
        params: Vec<ValueId>,
        param_types: Vec<Ty>,
        results: Vec<Ty>,
    ) -> FunctionId {
        let id = FunctionId(self.program.functions.len() as u32);
        self.program.functions.push(Function {
            id,
            name: name.to_owned(),
            signature,
            params,
            param_types,
            results,
            blocks: Vec::new(),
            pos: SourcePosition {
                file: name.to_owned(),
                line: 0,
            },
            is_synthetic_wrapper: false,
        });
        id
    }

    pub fn push_block(&mut self, func: FunctionId, instrs: Vec<Instr>) -> BlockId {
        let f = &mut self.program.functions[func.0 as usize];
        let id = BlockId(f.blocks.len() as u32);
        f.blocks.push(BasicBlock { id, instrs });
        id
    }

    pub fn mark_entry(&mut self, func: FunctionId) {
        self.program.entry_points.push(func);
    }

    pub fn add_method(&mut self, receiver_ty: Ty, name: &str, func: FunctionId) {
        let mid = MethodId {
            receiver_type: receiver_ty.clone(),
            name: name.to_owned(),
        };
        self.program
            .method_sets
            .entry(receiver_ty)
            .or_default()
            .push(mid.clone());
        self.program.method_impls.insert(mid, func);
    }

    pub fn build(self) -> Program {
        self.program
    }
}
