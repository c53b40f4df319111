//! The lazy definition AST.
//!
//! A definition body is a small tree of tagged nodes rather than a raw
//! [`Value`] so that a `prog`/`callback` definition can be handed to the
//! thread engine unevaluated while a `data` definition can still be forced
//! into a concrete value on demand. Application is represented uniformly as
//! a pair `(function, argument)`, matching how the rest of this engine
//! represents composite structure.

use glas_core::Value;

#[derive(Clone, Debug)]
pub enum Ast {
    /// `d:` — an already-concrete value, the base case of forcing.
    Data(Value),
    /// `t:` — a tagged/labeled node, e.g. a variant constructor.
    Tag(Vec<u8>, Box<Ast>),
    /// `e:` — read one member out of a reified environment value.
    FromEnv(Box<Ast>, Vec<u8>),
    /// `b:` — branch on a condition: `(cond, then, else)`.
    Branch(Box<Ast>, Box<Ast>, Box<Ast>),
    /// `a:` — application, represented as a `(function, argument)` pair.
    Apply(Box<Ast>, Box<Ast>),
    /// `c:` — sequential composition of two program fragments.
    Compose(Box<Ast>, Box<Ast>),
    /// `y:` — fixpoint: ties a definition to a reference of itself.
    Fix(Box<Ast>),
    /// Application-as-pair: a generic two-child node with no other meaning,
    /// used to build reified environments and other plain structure.
    Pair(Box<Ast>, Box<Ast>),
    /// A forward reference to another name, resolved against the namespace
    /// a thunk is forced in rather than against a fixed environment.
    Ref(Vec<u8>),
}

impl Ast {
    pub fn data(v: Value) -> Ast {
        Ast::Data(v)
    }

    pub fn pair(a: Ast, b: Ast) -> Ast {
        Ast::Pair(Box::new(a), Box::new(b))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefKind {
    /// A plain value, evaluated lazily and memoized on first force.
    Data,
    /// An executable program body, run by the thread/step engine.
    Prog,
    /// A program invoked by the host rather than called from glas code.
    Callback,
}

#[derive(Clone, Debug)]
pub struct Definition {
    pub kind: DefKind,
    pub ast: Ast,
}

impl Definition {
    pub fn data(ast: Ast) -> Definition {
        Definition { kind: DefKind::Data, ast }
    }

    pub fn prog(ast: Ast) -> Definition {
        Definition { kind: DefKind::Prog, ast }
    }

    pub fn callback(ast: Ast) -> Definition {
        Definition { kind: DefKind::Callback, ast }
    }

    /// The definition's value, when its body is already a forced `Data`
    /// node (as every `ns_data_def`/`ns_eval_def` definition is once
    /// resolved). Panics if called on a still-unevaluated non-data body.
    #[cfg(test)]
    pub fn ast_value(&self) -> Value {
        match &self.ast {
            Ast::Data(v) => v.clone(),
            _ => panic!("definition body is not a forced data value"),
        }
    }
}
