//! The value glob format: a `serde`/`bincode` encoding of a [`Value`],
//! distinct from [`crate::shrub`]'s 2-bit wire codec. Where shrub is the
//! compact, bit-packed transport format exchanged over the host boundary,
//! a glob is the debug/snapshot-friendly encoding — produced by
//! `bincode::serialize` over a plain serde-derived mirror of the value
//! tree, useful for diagnostics dumps and test fixtures where human/tool
//! readability of the intermediate struct matters more than density.

use crate::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Glob {
    Leaf,
    Stem(Vec<bool>, Box<Glob>),
    Branch(Box<Glob>, Box<Glob>),
}

#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("cannot glob-encode a sealed value")]
    Sealed,
    #[error("bincode serialization failed: {0}")]
    Encode(#[from] bincode::Error),
}

fn to_glob(v: &Value) -> Result<Glob, GlobError> {
    Ok(match v {
        Value::Leaf => Glob::Leaf,
        Value::Stem(bits, tail) => Glob::Stem(bits.to_vec(), Box::new(to_glob(tail)?)),
        Value::Branch(a, b) => Glob::Branch(Box::new(to_glob(a)?), Box::new(to_glob(b)?)),
        Value::Sealed(_) => return Err(GlobError::Sealed),
        other => match crate::rope::uncons(other) {
            None => Glob::Leaf,
            Some((head, tail)) => Glob::Branch(Box::new(to_glob(&head)?), Box::new(to_glob(&tail)?)),
        },
    })
}

fn from_glob(g: &Glob) -> Value {
    match g {
        Glob::Leaf => Value::Leaf,
        Glob::Stem(bits, tail) => Value::stem(crate::bits::Stem::from_bits(bits), from_glob(tail)),
        Glob::Branch(a, b) => Value::pair(from_glob(a), from_glob(b)),
    }
}

/// Encode a value as a glob byte string. Fails only for sealed values,
/// which are opaque by design and never cross a serialization boundary.
pub fn to_bytes(v: &Value) -> Result<Vec<u8>, GlobError> {
    let g = to_glob(v)?;
    Ok(bincode::serialize(&g)?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<Value, GlobError> {
    let g: Glob = bincode::deserialize(bytes)?;
    Ok(from_glob(&g))
}
