//! Pure flattening of a language type into its ordered list of scalar field
//! positions (spec.md §4.1). Used by every allocation and copy; independent
//! of the node table so it is trivially unit- and property-testable.

use serde::{Deserialize, Serialize};

/// A type in the analyzed program's type system, as handed to the analysis
/// by the (external, out of scope) type-checker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Ty {
    /// Any of: numeric, bool, string header, pointer, channel, map,
    /// function value, slice header, interface head — one scalar node.
    Basic(BasicKind),
    Struct(Vec<StructField>),
    Array(Box<Ty>),
    Tuple(Vec<Ty>),
    /// A type with no pointer-like scalars; flattens to nothing.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BasicKind {
    Numeric,
    Bool,
    String,
    Pointer,
    Chan,
    Map,
    Func,
    Slice,
    Interface,
    /// Analytically uninteresting scalar (e.g. a numeric constant type with
    /// no pointer content) — flattens to nothing, distinct from `Ty::Invalid`
    /// only in that it names a real basic kind.
    NonPointer,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: Ty,
}

/// One entry of a type's flattening: the scalar type at this position and
/// the subelement path that reaches it from the root type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatField {
    pub ty: Ty,
    pub path: String,
}

/// Flattens `ty` into its ordered list of scalar field positions.
///
/// - Basic scalar: one entry of itself (unless it is `BasicKind::NonPointer`,
///   which flattens to nothing).
/// - Struct: concatenation of field flattenings, path extended by `.name`.
/// - Array: one flattening of the element type, path extended by `[*]`
///   (element-collapsed: every index shares one node).
/// - Tuple: concatenation of flattenings, path extended by `#i`.
pub fn flatten(ty: &Ty) -> Vec<FlatField> {
    let mut out = Vec::new();
    flatten_into(ty, "", &mut out);
    out
}

fn flatten_into(ty: &Ty, path: &str, out: &mut Vec<FlatField>) {
    match ty {
        Ty::Invalid => {}
        Ty::Basic(BasicKind::NonPointer) => {}
        Ty::Basic(_) => out.push(FlatField {
            ty: ty.clone(),
            path: path.to_owned(),
        }),
        Ty::Struct(fields) => {
            for f in fields {
                flatten_into(&f.ty, &format!("{path}.{}", f.name), out);
            }
        }
        Ty::Array(elem) => {
            flatten_into(elem, &format!("{path}[*]"), out);
        }
        Ty::Tuple(elems) => {
            for (i, e) in elems.iter().enumerate() {
                flatten_into(e, &format!("{path}#{i}"), out);
            }
        }
    }
}

/// Number of scalar nodes `ty` decomposes into. `sizeof(T) == 0` iff `T` is
/// analytically uninteresting (no pointer-like content); such types map to
/// node id `0` and are excluded from constraints.
pub fn sizeof(ty: &Ty) -> usize {
    flatten(ty).len()
}

/// The declared (unflattened) type of field `index` of a struct or tuple.
pub fn field_type(ty: &Ty, index: usize) -> Ty {
    match ty {
        Ty::Struct(fields) => fields[index].ty.clone(),
        Ty::Tuple(elems) => elems[index].clone(),
        _ => panic!("field_type called on non-aggregate type {ty:?}"),
    }
}

/// Sum of `sizeof` of the first `index` fields of a struct type. Panics if
/// `ty` is not a struct or `index` is out of range — callers only ever
/// invoke this against a field-address instruction whose operand type is
/// already known to be a struct with at least that many fields.
pub fn offset_of(ty: &Ty, index: usize) -> usize {
    match ty {
        Ty::Struct(fields) => fields[..index].iter().map(|f| sizeof(&f.ty)).sum(),
        Ty::Tuple(elems) => elems[..index].iter().map(sizeof).sum(),
        _ => panic!("offset_of called on non-aggregate type {ty:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ptr() -> Ty {
        Ty::Basic(BasicKind::Pointer)
    }

    fn non_ptr() -> Ty {
        Ty::Basic(BasicKind::NonPointer)
    }

    #[test]
    fn basic_scalar_flattens_to_one_entry() {
        assert_eq!(flatten(&ptr()).len(), 1);
    }

    #[test]
    fn non_pointer_scalar_flattens_to_nothing() {
        assert_eq!(flatten(&non_ptr()), vec![]);
        assert_eq!(sizeof(&non_ptr()), 0);
    }

    #[test]
    fn struct_concatenates_field_flattenings_with_dotted_path() {
        let s = Ty::Struct(vec![
            StructField {
                name: "a".into(),
                ty: ptr(),
            },
            StructField {
                name: "b".into(),
                ty: non_ptr(),
            },
            StructField {
                name: "c".into(),
                ty: ptr(),
            },
        ]);
        let flat = flatten(&s);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].path, ".a");
        assert_eq!(flat[1].path, ".c");
        assert_eq!(sizeof(&s), 2);
        assert_eq!(offset_of(&s, 2), 1);
    }

    #[test]
    fn array_collapses_all_indices_to_one_node() {
        let arr = Ty::Array(Box::new(ptr()));
        let flat = flatten(&arr);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].path, "[*]");
    }

    #[test]
    fn tuple_concatenates_with_hash_index_path() {
        let t = Ty::Tuple(vec![ptr(), ptr()]);
        let flat = flatten(&t);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].path, "#0");
        assert_eq!(flat[1].path, "#1");
    }

    #[test]
    fn flattening_is_idempotent() {
        // flatten(flatten(T).types) == flatten(T): re-flattening the tuple of
        // already-scalar field types reproduces the same scalar sequence.
        let s = Ty::Struct(vec![
            StructField {
                name: "a".into(),
                ty: ptr(),
            },
            StructField {
                name: "b".into(),
                ty: Ty::Array(Box::new(ptr())),
            },
        ]);
        let once = flatten(&s);
        let retupled = Ty::Tuple(once.iter().map(|f| f.ty.clone()).collect());
        let twice = flatten(&retupled);
        let once_types: Vec<&Ty> = once.iter().map(|f| &f.ty).collect();
        let twice_types: Vec<&Ty> = twice.iter().map(|f| &f.ty).collect();
        assert_eq!(once_types, twice_types);
    }
}
