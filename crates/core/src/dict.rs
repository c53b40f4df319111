//! Dict/record operations.
//!
//! A record is not a separate value shape: it is a [`Value`] whose
//! `Branch`/`Stem` spine is read as a bitwise radix trie keyed by
//! null-terminated UTF-8 labels. Label bits are the label's bytes,
//! most-significant-bit first, followed by a terminating zero byte. Since
//! labels never contain an embedded null, no label's encoding is a proper
//! prefix of another's, so every insertion has an unambiguous place to end.

use crate::bits::Stem;
use crate::value::Value;
use std::sync::Arc;

fn label_bits(label: &str) -> Stem {
    let mut bits = Vec::with_capacity((label.len() + 1) * 8);
    for byte in label.as_bytes() {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    for _ in 0..8 {
        bits.push(false);
    }
    Stem::from_bits(&bits)
}

/// Merge a leading bit into `v`, compacting into an existing stem if present.
fn push_bit(bit: bool, v: Value) -> Value {
    Value::push_bit(bit, v)
}

pub fn empty() -> Value {
    Value::Leaf
}

pub fn is_dict(v: &Value) -> bool {
    matches!(v, Value::Leaf | Value::Branch(_, _) | Value::Stem(_, _))
}

pub fn insert(record: &Value, label: &str, item: Value) -> Value {
    insert_bits(record, &label_bits(label), item)
}

fn insert_bits(node: &Value, key: &Stem, item: Value) -> Value {
    if key.is_empty() {
        return item;
    }
    match node {
        Value::Leaf => Value::stem(key.clone(), item),
        Value::Branch(l, r) => {
            let (bit, rest) = key.split_first().unwrap();
            if bit {
                Value::Branch(l.clone(), Arc::new(insert_bits(r, &rest, item)))
            } else {
                Value::Branch(Arc::new(insert_bits(l, &rest, item)), r.clone())
            }
        }
        Value::Stem(bits, tail) => {
            let cp = bits.common_prefix_len(key);
            if cp == key.len() {
                // Key fully consumed; by the null-terminated-label invariant
                // this coincides with the end of the stem too.
                item
            } else if cp == bits.len() {
                let (_, rest_key) = key.split_at(cp);
                Value::stem(bits.clone(), insert_bits(tail, &rest_key, item))
            } else {
                let (common, stem_rest) = bits.split_at(cp);
                let (stem_bit, stem_rest) = stem_rest.split_first().unwrap();
                let (_, key_rest) = key.split_at(cp);
                let (key_bit, key_rest) = key_rest.split_first().unwrap();
                debug_assert_ne!(stem_bit, key_bit);
                let old_branch = Value::stem(stem_rest, (**tail).clone());
                let new_branch = insert_bits(&Value::Leaf, &key_rest, item);
                let branch = if key_bit {
                    Value::Branch(Arc::new(old_branch), Arc::new(new_branch))
                } else {
                    Value::Branch(Arc::new(new_branch), Arc::new(old_branch))
                };
                Value::stem(common, branch)
            }
        }
        other => Value::stem(key.clone(), other.clone()),
    }
}

pub fn remove(record: &Value, label: &str) -> Option<(Value, Value)> {
    remove_bits(record, &label_bits(label))
}

fn remove_bits(node: &Value, key: &Stem) -> Option<(Value, Value)> {
    if key.is_empty() {
        return Some((node.clone(), Value::Leaf));
    }
    match node {
        Value::Leaf => None,
        Value::Branch(l, r) => {
            let (bit, rest) = key.split_first().unwrap();
            if bit {
                let (item, r2) = remove_bits(r, &rest)?;
                Some((item, rebuild_branch(l.clone(), true, r2)))
            } else {
                let (item, l2) = remove_bits(l, &rest)?;
                Some((item, rebuild_branch(Arc::new(l2), false, (**r).clone())))
            }
        }
        Value::Stem(bits, tail) => {
            let cp = bits.common_prefix_len(key);
            if cp < bits.len().min(key.len()) {
                None
            } else if cp == key.len() {
                if cp == bits.len() {
                    Some(((**tail).clone(), Value::Leaf))
                } else {
                    let (_, rest_bits) = bits.split_at(cp);
                    Some((Value::stem(rest_bits, (**tail).clone()), Value::Leaf))
                }
            } else {
                let (_, rest_key) = key.split_at(cp);
                let (item, tail2) = remove_bits(tail, &rest_key)?;
                let result = if tail2.is_leaf() {
                    Value::Leaf
                } else {
                    Value::stem(bits.clone(), tail2)
                };
                Some((item, result))
            }
        }
        _ => None,
    }
}

/// Rebuild a branch after removing from one side, collapsing a `Leaf` child
/// back into the path-compressed stem form.
fn rebuild_branch(l: Arc<Value>, changed_was_right: bool, r: Value) -> Value {
    let (l, r) = if changed_was_right { ((*l).clone(), r) } else { ((*l).clone(), r) };
    match (&l, &r) {
        (Value::Leaf, Value::Leaf) => Value::Leaf,
        (Value::Leaf, other) => push_bit(true, other.clone()),
        (other, Value::Leaf) => push_bit(false, other.clone()),
        _ => Value::Branch(Arc::new(l), Arc::new(r)),
    }
}

pub fn contains(record: &Value, label: &str) -> bool {
    lookup(record, label).is_some()
}

pub fn lookup(record: &Value, label: &str) -> Option<Value> {
    lookup_bits(record, &label_bits(label))
}

fn lookup_bits(node: &Value, key: &Stem) -> Option<Value> {
    if key.is_empty() {
        return Some(node.clone());
    }
    match node {
        Value::Leaf => None,
        Value::Branch(l, r) => {
            let (bit, rest) = key.split_first().unwrap();
            if bit {
                lookup_bits(r, &rest)
            } else {
                lookup_bits(l, &rest)
            }
        }
        Value::Stem(bits, tail) => {
            let cp = bits.common_prefix_len(key);
            if cp == bits.len() && cp <= key.len() {
                let (_, rest_key) = key.split_at(cp);
                lookup_bits(tail, &rest_key)
            } else if cp == key.len() {
                Some(if cp == bits.len() { (**tail).clone() } else { Value::stem(bits.split_at(cp).1, (**tail).clone()) })
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let d = empty();
        let d = insert(&d, "x", Value::from_u64(1));
        let d = insert(&d, "y", Value::from_u64(2));
        assert_eq!(lookup(&d, "x"), Some(Value::from_u64(1)));
        assert_eq!(lookup(&d, "y"), Some(Value::from_u64(2)));
        assert_eq!(lookup(&d, "z"), None);
    }

    #[test]
    fn insert_overwrite() {
        let d = insert(&empty(), "x", Value::from_u64(1));
        let d = insert(&d, "x", Value::from_u64(9));
        assert_eq!(lookup(&d, "x"), Some(Value::from_u64(9)));
    }

    #[test]
    fn remove_roundtrip() {
        let d = insert(&empty(), "abc", Value::from_u64(1));
        let d = insert(&d, "abd", Value::from_u64(2));
        let (item, d2) = remove(&d, "abc").unwrap();
        assert_eq!(item, Value::from_u64(1));
        assert_eq!(lookup(&d2, "abc"), None);
        assert_eq!(lookup(&d2, "abd"), Some(Value::from_u64(2)));
    }

    #[test]
    fn remove_missing_fails() {
        let d = insert(&empty(), "x", Value::from_u64(1));
        assert!(remove(&d, "nope").is_none());
    }

    #[test]
    fn remove_all_collapses_to_empty() {
        let d = insert(&empty(), "solo", Value::from_u64(1));
        let (_, d2) = remove(&d, "solo").unwrap();
        assert_eq!(d2, empty());
    }

    #[test]
    fn many_labels_survive_insert_remove_cycle() {
        let labels = ["alpha", "beta", "gamma", "alphabet", "al"];
        let mut d = empty();
        for (i, l) in labels.iter().enumerate() {
            d = insert(&d, l, Value::from_u64(i as u64));
        }
        for (i, l) in labels.iter().enumerate() {
            assert_eq!(lookup(&d, l), Some(Value::from_u64(i as u64)));
        }
        let (item, d2) = remove(&d, "alpha").unwrap();
        assert_eq!(item, Value::from_u64(0));
        assert_eq!(lookup(&d2, "alphabet"), Some(Value::from_u64(3)));
        assert_eq!(lookup(&d2, "alpha"), None);
    }
}
