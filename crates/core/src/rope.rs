//! List/rope operations.
//!
//! A list is any value reachable by repeated `uncons` down to [`Value::Leaf`]
//! (the empty list). [`Value::Array`], [`Value::Binary`], [`Value::Concat`]
//! and [`Value::Take`] are bulk encodings of exactly that Branch-spine list,
//! kept distinct only to avoid one tree node per element. Thresholds below
//! are implementation-tunable; they bound how large a digit grows before a
//! concat/take builds a fresh chunk instead of deferring.
use crate::value::Value;
use std::sync::Arc;

pub const SMALL_ARRAY_MAX: usize = 6;
pub const SMALL_BINARY_MAX: usize = 16;
pub const LARGE_ARRAY_MAX: usize = 512;
pub const LARGE_BINARY_MAX: usize = 4096;

fn byte_value(b: u8) -> Value {
    let bits: Vec<bool> = (0..8).rev().map(|i| (b >> i) & 1 == 1).collect();
    Value::stem(crate::bits::Stem::from_bits(&bits), Value::Leaf)
}

fn value_byte(v: &Value) -> Option<u8> {
    match v {
        Value::Stem(bits, tail) if tail.is_leaf() && bits.len() == 8 => {
            let mut acc = 0u8;
            for b in bits.iter() {
                acc = (acc << 1) | (b as u8);
            }
            Some(acc)
        }
        _ => None,
    }
}

/// Decompose a value as a list cell: `None` for the empty list, `Some((head,
/// tail))` otherwise. Works uniformly across every list-shaped encoding.
pub fn uncons(v: &Value) -> Option<(Value, Value)> {
    match v {
        Value::Leaf => None,
        Value::Branch(a, b) => Some(((**a).clone(), (**b).clone())),
        Value::Array(items) => {
            if items.is_empty() {
                None
            } else {
                Some((items[0].clone(), Value::Array(Arc::from(&items[1..]))))
            }
        }
        Value::Binary(bytes) => {
            if bytes.is_empty() {
                None
            } else {
                Some((byte_value(bytes[0]), Value::Binary(Arc::from(&bytes[1..]))))
            }
        }
        Value::Concat(a, b) => match uncons(a) {
            Some((h, t)) => Some((h, Value::Concat(Arc::new(t), b.clone()))),
            None => uncons(b),
        },
        Value::Take(n, v) => {
            if *n == 0 {
                None
            } else {
                uncons(v).map(|(h, t)| (h, Value::Take(n - 1, Arc::new(t))))
            }
        }
        Value::Stem(_, _) | Value::Sealed(_) => None,
    }
}

pub fn cons(head: Value, tail: Value) -> Value {
    Value::pair(head, tail)
}

pub(crate) fn flatten_bits_eq(a: &Value, b: &Value) -> bool {
    if matches!(a, Value::Stem(_, _)) || matches!(b, Value::Stem(_, _)) {
        return false;
    }
    match (uncons(a), uncons(b)) {
        (None, None) => true,
        (Some((h1, t1)), Some((h2, t2))) => h1.value_eq(&h2) && t1.value_eq(&t2),
        _ => false,
    }
}

pub(crate) fn hash_canonical<H: std::hash::Hasher>(v: &Value, state: &mut H) {
    use std::hash::Hash;
    match v {
        Value::Stem(bits, tail) => {
            state.write_u8(0);
            bits.to_vec().hash(state);
            hash_canonical(tail, state);
        }
        Value::Sealed(s) => {
            state.write_u8(2);
            s.key.hash(state);
            s.linear.hash(state);
            hash_canonical(&s.inner, state);
        }
        _ => match uncons(v) {
            None => state.write_u8(1),
            Some((h, t)) => {
                state.write_u8(3);
                hash_canonical(&h, state);
                hash_canonical(&t, state);
            }
        },
    }
}

pub fn is_list(v: &Value) -> bool {
    match v {
        Value::Leaf => true,
        Value::Branch(_, tail) => is_list(tail),
        Value::Array(_) | Value::Binary(_) | Value::Concat(_, _) | Value::Take(_, _) => true,
        Value::Stem(_, _) | Value::Sealed(_) => false,
    }
}

pub fn is_binary(v: &Value) -> bool {
    match v {
        Value::Leaf => true,
        Value::Binary(_) => true,
        Value::Branch(h, t) => value_byte(h).is_some() && is_binary(t),
        Value::Concat(a, b) => is_binary(a) && is_binary(b),
        Value::Take(_, v) => is_binary(v),
        _ => false,
    }
}

/// `O(1)` for `Array`/`Binary`/`Take`, `O(n)` down a cons/`Concat` spine.
pub fn length(v: &Value) -> usize {
    match v {
        Value::Leaf => 0,
        Value::Array(items) => items.len(),
        Value::Binary(bytes) => bytes.len(),
        Value::Take(n, _) => *n,
        Value::Concat(a, b) => length(a) + length(b),
        Value::Branch(_, t) => 1 + length(t),
        _ => 0,
    }
}

/// Materialize a list into a `Vec<Value>`, losing rope sharing.
pub fn to_vec(v: &Value) -> Vec<Value> {
    let mut out = Vec::with_capacity(length(v));
    let mut cur = v.clone();
    while let Some((h, t)) = uncons(&cur) {
        out.push(h);
        cur = t;
    }
    out
}

pub fn singleton(v: Value) -> Value {
    Value::Array(Arc::from(vec![v]))
}

pub fn from_vec(items: Vec<Value>) -> Value {
    if items.is_empty() {
        Value::Leaf
    } else if items.len() <= SMALL_ARRAY_MAX || items.len() <= LARGE_ARRAY_MAX {
        Value::Array(Arc::from(items))
    } else {
        let mid = items.len() / 2;
        let mut rest = items;
        let tail = rest.split_off(mid);
        Value::Concat(Arc::new(Value::Array(Arc::from(rest))), Arc::new(Value::Array(Arc::from(tail))))
    }
}

pub fn append(a: &Value, b: &Value) -> Value {
    if length(a) == 0 {
        return b.clone();
    }
    if length(b) == 0 {
        return a.clone();
    }
    if length(a) + length(b) <= SMALL_ARRAY_MAX {
        let mut items = to_vec(a);
        items.extend(to_vec(b));
        return Value::Array(Arc::from(items));
    }
    Value::Concat(Arc::new(a.clone()), Arc::new(b.clone()))
}

/// Split a list into its first `n` elements and the remainder.
pub fn split_at(v: &Value, n: usize) -> (Value, Value) {
    if n == 0 {
        return (Value::Leaf, v.clone());
    }
    if n >= length(v) {
        return (v.clone(), Value::Leaf);
    }
    let prefix = Value::Take(n, Arc::new(v.clone()));
    let mut suffix = v.clone();
    let mut remaining = n;
    while remaining > 0 {
        match uncons(&suffix) {
            Some((_, t)) => {
                suffix = t;
                remaining -= 1;
            }
            None => break,
        }
    }
    (normalize_small(prefix), suffix)
}

fn normalize_small(v: Value) -> Value {
    let len = length(&v);
    if len <= SMALL_ARRAY_MAX {
        Value::Array(Arc::from(to_vec(&v)))
    } else {
        v
    }
}

pub fn index(v: &Value, i: usize) -> Option<Value> {
    match v {
        Value::Array(items) => items.get(i).cloned(),
        Value::Binary(bytes) => bytes.get(i).copied().map(byte_value),
        Value::Take(n, inner) => {
            if i < *n {
                index(inner, i)
            } else {
                None
            }
        }
        Value::Concat(a, b) => {
            let la = length(a);
            if i < la {
                index(a, i)
            } else {
                index(b, i - la)
            }
        }
        _ => {
            let (h, t) = uncons(v)?;
            if i == 0 {
                Some(h)
            } else {
                index(&t, i - 1)
            }
        }
    }
}

pub fn reverse(v: &Value) -> Value {
    let mut items = to_vec(v);
    items.reverse();
    from_vec(items)
}

pub fn to_bytes(v: &Value) -> Option<Vec<u8>> {
    if !is_binary(v) {
        return None;
    }
    match v {
        Value::Binary(b) => Some(b.to_vec()),
        _ => {
            let mut out = Vec::with_capacity(length(v));
            let mut cur = v.clone();
            while let Some((h, t)) = uncons(&cur) {
                out.push(value_byte(&h)?);
                cur = t;
            }
            Some(out)
        }
    }
}

pub fn from_bytes(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Leaf
    } else {
        Value::Binary(Arc::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(xs: &[u64]) -> Value {
        from_vec(xs.iter().map(|&n| Value::from_u64(n)).collect())
    }

    #[test]
    fn array_and_cons_spine_are_equal() {
        let spine = cons(Value::from_u64(1), cons(Value::from_u64(2), Value::Leaf));
        let array = Value::Array(Arc::from(vec![Value::from_u64(1), Value::from_u64(2)]));
        assert_eq!(spine, array);
    }

    #[test]
    fn binary_equals_byte_spine() {
        let spine = cons(super::byte_value(65), cons(super::byte_value(66), Value::Leaf));
        let binary = from_bytes(b"AB");
        assert_eq!(spine, binary);
    }

    #[test]
    fn length_matches_cons_count() {
        let l = list_of(&[1, 2, 3, 4]);
        assert_eq!(length(&l), 4);
    }

    #[test]
    fn take_drop_reassemble() {
        let l = list_of(&[1, 2, 3, 4, 5]);
        let (prefix, suffix) = split_at(&l, 2);
        assert_eq!(length(&prefix), 2);
        assert_eq!(append(&prefix, &suffix), l);
    }

    #[test]
    fn index_matches_to_vec() {
        let l = list_of(&[10, 20, 30]);
        let v = to_vec(&l);
        for i in 0..v.len() {
            assert_eq!(index(&l, i), Some(v[i].clone()));
        }
        assert_eq!(index(&l, 3), None);
    }

    #[test]
    fn reverse_twice_is_identity() {
        let l = list_of(&[1, 2, 3]);
        assert_eq!(reverse(&reverse(&l)), l);
    }

    #[test]
    fn concat_uncons_crosses_boundary() {
        let a = list_of(&[1, 2]);
        let b = list_of(&[3, 4]);
        let c = Value::Concat(Arc::new(a), Arc::new(b));
        assert_eq!(to_vec(&c), vec![Value::from_u64(1), Value::from_u64(2), Value::from_u64(3), Value::from_u64(4)]);
    }
}
