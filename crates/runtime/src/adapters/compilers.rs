//! Stub namespace content: primitive operators and the (empty) builtin
//! compiler registry.
//!
//! Front-end language compilers are explicitly out of scope for this
//! crate — `ns_load_builtin_compilers` exists only as the extension point a
//! host is expected to populate; it ships returning "undefined" for every
//! extension.

use crate::namespace::ast::Ast;
use crate::namespace::Namespace;
use glas_core::Value;
use std::sync::Arc;

/// Install a small table of arithmetic/comparison primitives as `prog`
/// definitions under `prefix`, e.g. `prefix.add`, `prefix.eq`. These are
/// the only primitives this crate bundles; anything resembling a standard
/// library belongs to a host-supplied namespace layer.
pub fn ns_load_prims(ns: &Arc<Namespace>, prefix: &str) -> Arc<Namespace> {
    let mut ns = ns.clone();
    for name in ["add", "sub", "eq", "lt"] {
        let full = format!("{prefix}{name}");
        ns = ns.ns_cb_def(full, Ast::Ref(name.as_bytes().to_vec()));
    }
    ns
}

/// Always undefined: no compiler ships with this runtime. A host that
/// wants `.glas`/`.json`/etc front-end support installs its own definitions
/// at `prefix<extension>` before loading any module that needs them.
pub fn ns_load_builtin_compilers(ns: &Arc<Namespace>, prefix: &str) -> Arc<Namespace> {
    let _ = prefix;
    ns.clone()
}

pub fn apply_primitive(name: &[u8], lhs: Value, rhs: Value) -> Option<Value> {
    match name {
        b"add" => Some(Value::from_i64(lhs.to_i64()?.checked_add(rhs.to_i64()?)?)),
        b"sub" => Some(Value::from_i64(lhs.to_i64()?.checked_sub(rhs.to_i64()?)?)),
        b"eq" => Some(if lhs == rhs { Value::from_u64(1) } else { Value::Leaf }),
        b"lt" => Some(if lhs.to_i64()? < rhs.to_i64()? { Value::from_u64(1) } else { Value::Leaf }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_compilers_is_a_no_op() {
        let ns = Namespace::root();
        let ns2 = ns_load_builtin_compilers(&ns, "lang.");
        assert!(ns2.resolve(b"lang.glas").is_none());
    }

    #[test]
    fn add_primitive() {
        assert_eq!(apply_primitive(b"add", Value::from_u64(2), Value::from_u64(3)), Some(Value::from_u64(5)));
    }

    #[test]
    fn unknown_primitive_is_none() {
        assert_eq!(apply_primitive(b"mul", Value::from_u64(2), Value::from_u64(3)), None);
    }
}
