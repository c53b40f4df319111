//! `call`, `call_atomic` and `prep`: the three ways a step invokes a
//! namespace definition.

use super::error::ErrorFlags;
use super::Thread;
use crate::namespace::ast::{Ast, DefKind};
use crate::namespace::eval;

/// Resolve `name` in the thread's current namespace: if it is a data
/// definition, force it and push a copy; if a program or callback, pop one
/// argument, apply it, and push the result. Raises `NAME_UNDEF` if the name
/// has no definition.
pub fn call(thread: &mut Thread, name: &[u8]) {
    let Some(def) = thread.namespace().resolve(name) else {
        thread.raise(ErrorFlags::NAME_UNDEF);
        return;
    };
    if def.kind == DefKind::Data {
        let value = eval::eval(&def.ast, thread.namespace().as_ref());
        thread.push(value);
        return;
    }
    let Some(arg) = thread.pop() else { return };
    let applied = Ast::Apply(Box::new(def.ast.clone()), Box::new(Ast::Data(arg)));
    let result = eval::eval(&applied, thread.namespace().as_ref());
    thread.push(result);
}

/// As [`call`], but the invoked program runs inside an atomic section: no
/// intermediate commit is observable to other threads until the whole
/// section concludes.
pub fn call_atomic(thread: &mut Thread, name: &[u8]) {
    thread.enter_atomic();
    call(thread, name);
    thread.exit_atomic();
}

/// Warm the lazy-evaluation cache for `name` on a background worker without
/// blocking the caller or changing the stack. A no-op if the name is
/// undefined or already memoized.
pub fn prep(thread: &Thread, name: &[u8]) {
    let ns = thread.namespace().clone();
    let Some(def) = ns.resolve(name) else { return };
    if def.kind != DefKind::Data {
        return;
    }
    let ast = def.ast.clone();
    let env: std::sync::Arc<dyn eval::RefResolver + Send + Sync> = ns;
    let thunk = eval::Thunk::shared(ast);
    thunk.prefetch(env);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use crate::registers::RegisterStore;
    use glas_core::Value;
    use std::sync::Arc;

    #[test]
    fn call_undefined_name_raises_name_undef() {
        let mut t = Thread::new(Arc::new(RegisterStore::new()), Namespace::root());
        t.push(Value::from_u64(1));
        call(&mut t, b"nope");
        assert!(t.errors().contains(ErrorFlags::NAME_UNDEF));
    }

    #[test]
    fn call_on_data_def_pushes_a_copy() {
        let ns = Namespace::root().ns_data_def("x", Value::from_u64(9));
        let mut t = Thread::new(Arc::new(RegisterStore::new()), ns);
        t.push(Value::from_u64(1));
        call(&mut t, b"x");
        assert_eq!(t.pop(), Some(Value::from_u64(9)));
        assert_eq!(t.pop(), Some(Value::from_u64(1)));
        assert!(t.errors().is_empty());
    }

    #[test]
    fn call_atomic_wraps_call_in_atomic_section_and_restores() {
        let mut t = Thread::new(Arc::new(RegisterStore::new()), Namespace::root());
        t.push(Value::from_u64(1));
        call_atomic(&mut t, b"nope");
        assert!(!t.is_atomic());
    }
}
