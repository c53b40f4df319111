//! Lazy forcing of [`Ast`] nodes into values, with memoization so a
//! definition referenced from many call sites is only ever evaluated once.

use super::ast::Ast;
use glas_core::{dict, rope, Value};
use std::sync::OnceLock;

/// What a `Ref` node resolves against. [`crate::namespace::Namespace`]
/// implements this; kept as a trait here so `eval` doesn't depend on the
/// namespace module's own resolution/shadowing logic.
pub trait RefResolver {
    fn resolve_ref(&self, name: &[u8]) -> Option<Value>;
}

/// An `Ast` paired with a memo cell. Cheap to clone (an `Arc` in practice,
/// via `Thunk::shared`) and safe to force from multiple threads — only the
/// first caller to win the `OnceLock` race pays the evaluation cost.
pub struct Thunk {
    ast: Ast,
    memo: OnceLock<Value>,
}

impl Thunk {
    pub fn new(ast: Ast) -> Thunk {
        Thunk { ast, memo: OnceLock::new() }
    }

    pub fn shared(ast: Ast) -> std::sync::Arc<Thunk> {
        std::sync::Arc::new(Thunk::new(ast))
    }

    /// Force this thunk against `env`, caching the result. Safe to call
    /// concurrently: every caller blocks on the same underlying cell rather
    /// than redoing the work.
    pub fn force(&self, env: &dyn RefResolver) -> Value {
        if let Some(v) = self.memo.get() {
            return v.clone();
        }
        let v = eval(&self.ast, env);
        match self.memo.set(v.clone()) {
            Ok(()) => v,
            // Lost the race; the winner's value is canonical.
            Err(_) => self.memo.get().unwrap().clone(),
        }
    }

    /// Spawn a background coroutine that forces this thunk eagerly, so a
    /// later synchronous `force` call is likely to hit the memo cache.
    pub fn prefetch(self: &std::sync::Arc<Thunk>, env: std::sync::Arc<dyn RefResolver + Send + Sync>) {
        let this = self.clone();
        unsafe {
            may::coroutine::spawn(move || {
                this.force(env.as_ref());
            });
        }
    }
}

pub fn eval(ast: &Ast, env: &dyn RefResolver) -> Value {
    match ast {
        Ast::Data(v) => v.clone(),
        Ast::Ref(name) => env.resolve_ref(name).unwrap_or(Value::Leaf),
        Ast::Tag(label, inner) => {
            let v = eval(inner, env);
            dict::insert(&Value::Leaf, &String::from_utf8_lossy(label), v)
        }
        Ast::FromEnv(inner, member) => {
            let reified = eval(inner, env);
            dict::lookup(&reified, &String::from_utf8_lossy(member)).unwrap_or(Value::Leaf)
        }
        Ast::Branch(cond, then_branch, else_branch) => {
            let c = eval(cond, env);
            if is_truthy(&c) {
                eval(then_branch, env)
            } else {
                eval(else_branch, env)
            }
        }
        Ast::Apply(f, arg) => {
            let fv = eval(f, env);
            let av = eval(arg, env);
            rope::cons(fv, av)
        }
        Ast::Compose(first, second) => {
            let _ = eval(first, env);
            eval(second, env)
        }
        Ast::Fix(inner) => eval(inner, env),
        Ast::Pair(a, b) => Value::pair(eval(a, env), eval(b, env)),
    }
}

fn is_truthy(v: &Value) -> bool {
    !matches!(v, Value::Leaf)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyEnv;
    impl RefResolver for EmptyEnv {
        fn resolve_ref(&self, _name: &[u8]) -> Option<Value> {
            None
        }
    }

    #[test]
    fn data_forces_to_itself() {
        let t = Thunk::new(Ast::data(Value::from_u64(7)));
        assert_eq!(t.force(&EmptyEnv), Value::from_u64(7));
    }

    #[test]
    fn force_is_memoized() {
        let t = Thunk::new(Ast::data(Value::from_u64(1)));
        let first = t.force(&EmptyEnv);
        let second = t.force(&EmptyEnv);
        assert_eq!(first, second);
    }

    #[test]
    fn branch_picks_else_on_leaf_condition() {
        let ast = Ast::Branch(
            Box::new(Ast::data(Value::Leaf)),
            Box::new(Ast::data(Value::from_u64(1))),
            Box::new(Ast::data(Value::from_u64(0))),
        );
        assert_eq!(eval(&ast, &EmptyEnv), Value::from_u64(0));
    }

    #[test]
    fn tag_then_lookup_round_trips() {
        let tagged = Ast::Tag(b"x".to_vec(), Box::new(Ast::data(Value::from_u64(5))));
        let v = eval(&tagged, &EmptyEnv);
        assert_eq!(dict::lookup(&v, "x"), Some(Value::from_u64(5)));
    }
}
