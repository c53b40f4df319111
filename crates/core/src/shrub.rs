//! Shrub wire codec: 2 bits per node, a compact serialization for
//! `Leaf`/`Branch`/stem-bit trees (the form values take when they cross
//! into storage or onto the wire, prior to any rope/dict reinterpretation).
//!
//! Encoding, per node: `00` leaf, `01` branch (left subtree then right
//! subtree follow, depth-first), `10`/`11` a single stem bit followed by the
//! rest of the same stem node's encoding. The bitstream is padded to a byte
//! boundary with zero bits, which a well-formed decode must tolerate as
//! trailing padding rather than a malformed leaf/branch sequence.

use crate::value::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShrubError {
    #[error("shrub stream ended mid-node")]
    Truncated,
    #[error("shrub stream has non-zero trailing bits after the final value")]
    IllFormedTail,
}

struct BitWriter {
    bytes: Vec<u8>,
    cur: u8,
    filled: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { bytes: Vec::new(), cur: 0, filled: 0 }
    }

    fn push(&mut self, bit: bool) {
        if bit {
            self.cur |= 1 << (7 - self.filled);
        }
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.cur);
            self.cur = 0;
            self.filled = 0;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.cur);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize, // bit position
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, pos: 0 }
    }

    fn next(&mut self) -> Option<bool> {
        let byte_idx = self.pos / 8;
        let bit_idx = (self.pos % 8) as u32;
        let b = *self.bytes.get(byte_idx)?;
        self.pos += 1;
        Some((b >> (7 - bit_idx)) & 1 == 1)
    }

    fn remaining_are_zero(&self) -> bool {
        let total_bits = self.bytes.len() * 8;
        (self.pos..total_bits).all(|i| {
            let b = self.bytes[i / 8];
            (b >> (7 - (i % 8))) & 1 == 0
        })
    }
}

fn encode_node(v: &Value, w: &mut BitWriter) {
    match v {
        Value::Leaf => {
            w.push(false);
            w.push(false);
        }
        Value::Stem(bits, tail) => {
            for bit in bits.iter() {
                w.push(true);
                w.push(bit);
            }
            encode_node(tail, w);
        }
        Value::Branch(l, r) => {
            w.push(false);
            w.push(true);
            encode_node(l, w);
            encode_node(r, w);
        }
        // Rope/binary/sealed encodings are flattened to their canonical
        // branch/stem shape before serialization.
        Value::Array(_) | Value::Binary(_) | Value::Concat(_, _) | Value::Take(_, _) => {
            encode_node(&flatten(v), w);
        }
        Value::Sealed(_) => {
            // Sealed values are never observable outside their holder and
            // cannot cross the wire; encode as leaf rather than panic.
            w.push(false);
            w.push(false);
        }
    }
}

fn flatten(v: &Value) -> Value {
    match crate::rope::uncons(v) {
        Some((h, t)) => Value::pair(h, flatten(&t)),
        None => Value::Leaf,
    }
}

pub fn encode(v: &Value) -> Vec<u8> {
    let mut w = BitWriter::new();
    encode_node(v, &mut w);
    w.finish()
}

fn decode_node(r: &mut BitReader) -> Result<Value, ShrubError> {
    let tag0 = r.next().ok_or(ShrubError::Truncated)?;
    if !tag0 {
        let tag1 = r.next().ok_or(ShrubError::Truncated)?;
        if !tag1 {
            Ok(Value::Leaf)
        } else {
            let l = decode_node(r)?;
            let rgt = decode_node(r)?;
            Ok(Value::pair(l, rgt))
        }
    } else {
        let bit = r.next().ok_or(ShrubError::Truncated)?;
        let tail = decode_node(r)?;
        Ok(Value::push_bit(bit, tail))
    }
}

pub fn decode(bytes: &[u8]) -> Result<Value, ShrubError> {
    let mut r = BitReader::new(bytes);
    let v = decode_node(&mut r)?;
    if !r.remaining_are_zero() {
        return Err(ShrubError::IllFormedTail);
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_leaf() {
        assert_eq!(decode(&encode(&Value::Leaf)).unwrap(), Value::Leaf);
    }

    #[test]
    fn roundtrip_integer() {
        let v = Value::from_u64(12345);
        assert_eq!(decode(&encode(&v)).unwrap(), v);
    }

    #[test]
    fn roundtrip_pair() {
        let v = Value::pair(Value::from_u64(1), Value::from_u64(2));
        assert_eq!(decode(&encode(&v)).unwrap(), v);
    }

    #[test]
    fn roundtrip_list_via_array() {
        let v = crate::rope::from_vec(vec![Value::from_u64(1), Value::from_u64(2), Value::from_u64(3)]);
        let decoded = decode(&encode(&v)).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn truncated_stream_errors() {
        assert_eq!(decode(&[0b01000000]), Err(ShrubError::Truncated));
    }

    #[test]
    fn nonzero_tail_after_leaf_errors() {
        // leaf (00) followed by a stray set bit within the same byte
        assert_eq!(decode(&[0b00100000]), Err(ShrubError::IllFormedTail));
    }
}
